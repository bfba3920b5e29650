//! Firmware dialects
//!
//! Only the Marlin-style RepRap dialect is spoken: `ok` acknowledgements,
//! `T:` temperature reports and `M503` settings echoes.

pub mod marlin;
