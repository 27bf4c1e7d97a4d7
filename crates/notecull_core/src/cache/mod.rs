//! Local persistence of engine state between invocations.

pub mod snapshot;
