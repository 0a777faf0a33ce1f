pub mod alarm;
pub mod format;
pub mod sync;
