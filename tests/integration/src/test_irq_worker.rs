// Licensed under the Apache-2.0 license

//! Interrupt half and completion worker driving a client end to end.

#[cfg(test)]
mod test {
    use crate::test::{start_engine, transfer};
    use dma_driver::{CompletionWorker, Descriptor, DmaClient, DmaError, HardwareRevision};
    use poll_common::poll_until;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingClient {
        completed: Mutex<Vec<(u32, u64)>>,
        errors: Mutex<Vec<u32>>,
    }

    impl DmaClient for RecordingClient {
        fn transfer_complete(&self, channel: u32, descriptor: Descriptor) {
            self.completed
                .lock()
                .unwrap()
                .push((channel, descriptor.seq()));
        }

        fn transfer_error(&self, channel: u32, error: DmaError) {
            assert!(matches!(error, DmaError::ChannelError(c) if c == channel));
            self.errors.lock().unwrap().push(channel);
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);
    const INTERVAL: Duration = Duration::from_millis(1);

    #[test]
    fn test_worker_reports_completions_per_channel() {
        let (apbh, engine) = start_engine(HardwareRevision::Mx28, 0, 16);
        let engine = Arc::new(engine);
        let client = Arc::new(RecordingClient::default());
        let mut worker = CompletionWorker::spawn(engine.clone(), client.clone());
        let notifier = worker.notifier().unwrap();

        for ch in [1, 9] {
            engine.enable_irq(ch, true).unwrap();
            for _ in 0..3 {
                engine.enqueue(ch, transfer(&engine, 128, true)).unwrap();
            }
            engine.enable(ch).unwrap();
        }

        // One descriptor per interrupt on channel 1, all at once on channel 9.
        for _ in 0..3 {
            assert!(apbh.complete_descriptor(1));
            assert!(apbh.irq_line());
            let fired = notifier.interrupt(&engine).unwrap();
            assert_eq!(fired & (1 << 1), 1 << 1);
        }
        assert_eq!(apbh.run_channel(9), 3);
        notifier.interrupt(&engine).unwrap();
        assert!(!apbh.irq_line());

        poll_until(TIMEOUT, INTERVAL, || {
            Ok(client.completed.lock().unwrap().len() == 6)
        })
        .unwrap();
        worker.stop();

        let completed = client.completed.lock().unwrap().clone();
        for ch in [1, 9] {
            let seqs: Vec<u64> = completed
                .iter()
                .filter(|(c, _)| *c == ch)
                .map(|(_, seq)| *seq)
                .collect();
            assert_eq!(seqs, vec![0, 1, 2]);
            let status = engine.status(ch).unwrap();
            assert!(!status.busy);
            assert_eq!(status.completed, 3);
        }
    }

    #[test]
    fn test_worker_reports_errors() {
        let (apbh, engine) = start_engine(HardwareRevision::Mx23, 0, 8);
        let engine = Arc::new(engine);
        let client = Arc::new(RecordingClient::default());
        let mut worker = CompletionWorker::spawn(engine.clone(), client.clone());
        let notifier = worker.notifier().unwrap();

        apbh.raise_error(4);
        assert!(engine.irq_status(4).unwrap().error);
        assert_eq!(notifier.interrupt(&engine).unwrap(), 1 << 4);
        assert!(!engine.irq_is_pending(4).unwrap());

        poll_until(TIMEOUT, INTERVAL, || Ok(!client.errors.lock().unwrap().is_empty())).unwrap();
        worker.stop();

        assert_eq!(*client.errors.lock().unwrap(), vec![4]);
        assert_eq!(engine.status(4).unwrap().errors, 1);
        assert!(worker.notifier().is_none());
    }

    #[test]
    fn test_interrupt_without_events_is_quiet() {
        let (_apbh, engine) = start_engine(HardwareRevision::Mx28, 0, 4);
        let engine = Arc::new(engine);
        let client = Arc::new(RecordingClient::default());
        let mut worker = CompletionWorker::spawn(engine.clone(), client.clone());
        let notifier = worker.notifier().unwrap();

        assert_eq!(notifier.interrupt(&engine).unwrap(), 0);
        worker.stop();

        assert!(client.completed.lock().unwrap().is_empty());
        assert!(client.errors.lock().unwrap().is_empty());
    }
}
