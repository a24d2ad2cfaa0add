pub mod external_reference;
pub mod money;
pub mod schedule;
