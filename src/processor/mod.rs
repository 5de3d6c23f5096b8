pub mod columns;
pub mod entry_processor;
pub mod periods;
pub mod stats_table;
pub mod table_assembler;

pub use columns::*;
pub use entry_processor::*;
pub use periods::*;
pub use stats_table::*;
pub use table_assembler::*;
