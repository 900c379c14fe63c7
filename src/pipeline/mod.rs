pub mod diagnostic; // Dumps of undecodable model output (REPLENISH_DUMP_DIR or --debug-dir)
pub mod inference;
pub mod replenishment;
