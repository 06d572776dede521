// Licensed under the Apache-2.0 license

//! Bring-up, teardown and the channel control operations on both block
//! generations.

#[cfg(test)]
mod test {
    use crate::test::{init_logger, queues, start_engine, start_engine_with, transfer};
    use dma_driver::{
        ChannelState, DmaError, Engine, EngineConfig, HardwareRevision, RegisterWindow,
    };
    use emulator_periph::EmulatedApbh;
    use std::sync::Arc;

    const REVISIONS: [HardwareRevision; 2] = [HardwareRevision::Mx23, HardwareRevision::Mx28];

    #[test]
    fn test_init_gives_up_on_stuck_reset() {
        init_logger();
        for revision in REVISIONS {
            let apbh = Arc::new(EmulatedApbh::new(revision));
            apbh.set_stuck_in_reset(true);
            let mut config = EngineConfig::new(revision, 0, 4);
            config.reset_poll_limit = 50;
            config.reset_poll_delay_us = 0;

            let result = Engine::init(apbh.clone(), config);
            assert!(matches!(result, Err(DmaError::ResetTimeout(50))));
        }
    }

    #[test]
    fn test_init_powers_block_and_applies_burst() {
        let mut config = EngineConfig::new(HardwareRevision::Mx28, 0, 16);
        config.burst = true;
        config.burst8 = true;
        let (apbh, engine) = start_engine_with(config);

        let ctrl0 = apbh.ctrl0().get();
        assert_eq!(ctrl0 >> 28, 0b0011);
        for ch in engine.channels() {
            assert_eq!(engine.channel_state(ch).unwrap(), ChannelState::Idle);
            assert!(apbh.is_gated(ch));
        }

        engine.shutdown();
        assert!(apbh.block_gated());
    }

    #[test]
    fn test_sub_range_rejects_other_channels() {
        let (_apbh, engine) = start_engine(HardwareRevision::Mx28, 4, 8);
        assert_eq!(engine.channels(), 4..12);

        for ch in [0, 3, 12, 15] {
            let d = transfer(&engine, 8, false);
            assert!(matches!(engine.enqueue(ch, d), Err(DmaError::InvalidChannel(c)) if c == ch));
            assert!(matches!(engine.enable(ch), Err(DmaError::InvalidChannel(_))));
            assert!(matches!(engine.reset(ch), Err(DmaError::InvalidChannel(_))));
            assert!(matches!(engine.ack_irq(ch), Err(DmaError::InvalidChannel(_))));
        }
        engine.enqueue(4, transfer(&engine, 8, false)).unwrap();
        engine.enqueue(11, transfer(&engine, 8, false)).unwrap();

        let too_wide = EngineConfig::new(HardwareRevision::Mx23, 4, 8);
        assert!(matches!(
            Engine::init(Arc::new(EmulatedApbh::new(HardwareRevision::Mx23)), too_wide),
            Err(DmaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_disable_is_idempotent() {
        for revision in REVISIONS {
            let (apbh, engine) = start_engine(revision, 0, 4);
            for _ in 0..3 {
                engine.enqueue(1, transfer(&engine, 8, false)).unwrap();
            }
            engine.enable(1).unwrap();
            engine.enqueue(1, transfer(&engine, 8, false)).unwrap();

            engine.disable(1).unwrap();
            let once = (queues(&engine, 1), engine.status(1).unwrap(), apbh.is_gated(1));
            engine.disable(1).unwrap();
            let twice = (queues(&engine, 1), engine.status(1).unwrap(), apbh.is_gated(1));

            assert_eq!(once, twice);
            assert!(twice.2);
            assert!(!twice.1.busy);
            assert_eq!(twice.1.state, ChannelState::Idle);
            assert_eq!(twice.0, (vec![0, 1, 2], vec![3]));
        }
    }

    #[test]
    fn test_enable_after_disable_restarts_oldest() {
        let (apbh, engine) = start_engine(HardwareRevision::Mx28, 0, 4);
        let first = transfer(&engine, 8, false);
        let head = first.address();
        engine.enqueue(0, first).unwrap();
        engine.enqueue(0, transfer(&engine, 8, false)).unwrap();
        engine.enable(0).unwrap();

        engine.disable(0).unwrap();
        assert!(!apbh.complete_descriptor(0));
        engine.enqueue(0, transfer(&engine, 8, false)).unwrap();
        engine.enable(0).unwrap();

        assert_eq!(apbh.nxtcmdar_writes(0), vec![head, head]);
        assert_eq!(apbh.semaphore(0), 3);
        assert_eq!(apbh.run_channel(0), 3);
        assert_eq!(engine.on_completion(0, |_| ()).unwrap(), 3);
        assert_eq!(engine.channel_state(0).unwrap(), ChannelState::Idle);
    }

    #[test]
    fn test_enable_after_disable_skips_finished_descriptors() {
        for revision in REVISIONS {
            let (apbh, engine) = start_engine(revision, 0, 4);
            let mut addresses = Vec::new();
            for _ in 0..3 {
                let d = transfer(&engine, 8, true);
                addresses.push(d.address());
                engine.enqueue(0, d).unwrap();
            }
            engine.enable(0).unwrap();

            // The first descriptor finishes but is not retired before the
            // channel is stopped.
            assert!(apbh.complete_descriptor(0));
            assert_eq!(apbh.semaphore(0), 2);
            engine.disable(0).unwrap();
            engine.enable(0).unwrap();

            assert_eq!(apbh.nxtcmdar_writes(0), vec![addresses[0], addresses[1]]);
            assert_eq!(apbh.semaphore(0), 2);
            assert_eq!(apbh.run_channel(0), 2);

            let mut done = Vec::new();
            assert_eq!(engine.on_completion(0, |d| done.push(d.address())).unwrap(), 3);
            assert_eq!(done, addresses);
            let status = engine.status(0).unwrap();
            assert!(!status.busy);
            assert_eq!(status.state, ChannelState::Idle);
        }
    }

    #[test]
    fn test_enable_after_disable_with_everything_finished() {
        let (apbh, engine) = start_engine(HardwareRevision::Mx28, 0, 4);
        engine.enqueue(1, transfer(&engine, 8, false)).unwrap();
        engine.enqueue(1, transfer(&engine, 8, false)).unwrap();
        engine.enable(1).unwrap();
        assert_eq!(apbh.run_channel(1), 2);

        engine.disable(1).unwrap();
        engine.enable(1).unwrap();
        assert_eq!(apbh.nxtcmdar_writes(1).len(), 1);
        assert_eq!(apbh.semaphore(1), 0);
        assert!(apbh.is_gated(1));
        assert_eq!(engine.on_completion(1, |_| ()).unwrap(), 2);
    }

    #[test]
    fn test_reset_releases_frozen_channel() {
        for revision in REVISIONS {
            let (apbh, engine) = start_engine(revision, 0, 4);
            engine.enqueue(1, transfer(&engine, 8, false)).unwrap();
            engine.enable(1).unwrap();
            engine.freeze(1).unwrap();
            assert!(apbh.is_frozen(1));

            engine.reset(1).unwrap();
            assert!(!apbh.is_frozen(1));
            assert_eq!(engine.channel_state(1).unwrap(), ChannelState::Reset);

            engine.enqueue(1, transfer(&engine, 8, false)).unwrap();
            engine.enable(1).unwrap();
            assert_eq!(engine.channel_state(1).unwrap(), ChannelState::Running);
            assert_eq!(apbh.run_channel(1), 1);
            assert_eq!(engine.on_completion(1, |_| ()).unwrap(), 1);
        }
    }

    #[test]
    fn test_freeze_holds_channel() {
        for revision in REVISIONS {
            let (apbh, engine) = start_engine(revision, 0, 4);

            assert!(matches!(
                engine.freeze(3),
                Err(DmaError::InvalidState {
                    channel: 3,
                    state: ChannelState::Idle,
                    ..
                })
            ));

            engine.enqueue(3, transfer(&engine, 8, true)).unwrap();
            engine.enqueue(3, transfer(&engine, 8, true)).unwrap();
            engine.enable(3).unwrap();
            engine.freeze(3).unwrap();
            assert!(apbh.is_frozen(3));
            assert_eq!(engine.channel_state(3).unwrap(), ChannelState::Frozen);
            assert!(!apbh.complete_descriptor(3));

            // More work can be queued while frozen.
            engine.enqueue(3, transfer(&engine, 8, true)).unwrap();
            engine.enable(3).unwrap();
            assert_eq!(apbh.semaphore(3), 3);
            assert_eq!(engine.channel_state(3).unwrap(), ChannelState::Frozen);

            engine.unfreeze(3).unwrap();
            assert!(!apbh.is_frozen(3));
            assert_eq!(apbh.run_channel(3), 3);
            assert_eq!(engine.on_completion(3, |_| ()).unwrap(), 3);
            assert_eq!(engine.channel_state(3).unwrap(), ChannelState::Idle);
        }
    }

    #[test]
    fn test_reset_uses_layout_reset_bit() {
        for revision in REVISIONS {
            let (apbh, engine) = start_engine(revision, 0, 4);
            engine.enqueue(2, transfer(&engine, 8, false)).unwrap();
            engine.enable(2).unwrap();
            assert_eq!(apbh.semaphore(2), 1);

            engine.reset(2).unwrap();
            assert_eq!(apbh.semaphore(2), 0);
            let reset = engine.layout().reset_bit(2);
            assert_eq!(apbh.read(reset.offset) & reset.mask, 0);

            // The channel is usable again after a reset.
            engine.enqueue(2, transfer(&engine, 8, false)).unwrap();
            engine.enable(2).unwrap();
            assert_eq!(engine.channel_state(2).unwrap(), ChannelState::Running);
            assert_eq!(apbh.semaphore(2), 1);
        }
    }

    #[test]
    fn test_request_release_cycle() {
        let (apbh, engine) = start_engine(HardwareRevision::Mx23, 0, 8);

        engine.request(6, "gpmi-nfc").unwrap();
        assert!(matches!(
            engine.request(6, "mxs-mmc"),
            Err(DmaError::ChannelInUse { channel: 6, ref owner }) if owner == "gpmi-nfc"
        ));
        engine.enable_irq(6, true).unwrap();
        engine.enqueue(6, transfer(&engine, 8, true)).unwrap();
        engine.enable(6).unwrap();
        apbh.complete_descriptor(6);
        assert!(apbh.irq_line());

        engine.release(6, "gpmi-nfc").unwrap();
        let status = engine.status(6).unwrap();
        assert_eq!(status.owner, None);
        assert!(!status.irq_enabled);
        assert_eq!((status.active_count, status.pending_count), (0, 0));

        engine.ack_irq(6).unwrap();
        assert!(!apbh.irq_line());
        engine.request(6, "mxs-mmc").unwrap();
    }
}
