// Licensed under the Apache-2.0 license

mod test_engine_lifecycle;
mod test_irq_worker;

#[cfg(test)]
mod test {
    use dma_driver::{Command, Descriptor, Engine, EngineConfig, HardwareRevision};
    use emulator_periph::EmulatedApbh;
    use log::LevelFilter;
    use simple_logger::SimpleLogger;
    use std::sync::Arc;

    pub type TestEngine = Engine<Arc<EmulatedApbh>>;

    pub fn init_logger() {
        let _ = SimpleLogger::new().with_level(LevelFilter::Debug).init();
    }

    pub fn start_engine_with(config: EngineConfig) -> (Arc<EmulatedApbh>, TestEngine) {
        init_logger();
        let apbh = Arc::new(EmulatedApbh::new(config.revision));
        let engine = Engine::init(apbh.clone(), config).unwrap();
        (apbh, engine)
    }

    pub fn start_engine(
        revision: HardwareRevision,
        channel_base: u32,
        channel_count: u32,
    ) -> (Arc<EmulatedApbh>, TestEngine) {
        start_engine_with(EngineConfig::new(revision, channel_base, channel_count))
    }

    /// A pool descriptor moving `length` bytes from memory to a peripheral.
    pub fn transfer(engine: &TestEngine, length: u32, notify: bool) -> Descriptor {
        engine
            .alloc_descriptor(Command::Write)
            .unwrap()
            .with_buffer(0x2000_0000, length)
            .with_completion(notify)
    }

    /// Sequence numbers of the active and pending lists of `channel`.
    pub fn queues(engine: &TestEngine, channel: u32) -> (Vec<u64>, Vec<u64>) {
        engine
            .with_channel(channel, |ch| {
                (
                    ch.active().map(|d| d.seq()).collect(),
                    ch.pending().map(|d| d.seq()).collect(),
                )
            })
            .unwrap()
    }
}
