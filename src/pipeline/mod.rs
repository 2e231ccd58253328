pub mod extraction;
pub mod structuring;
pub mod storage;
pub mod diagnostic; // Raw prompt/reply dump (dump_raw_replies)
pub mod processor; // Three-stage process model orchestrator
