mod phase;

pub use phase::SessionPhase;
