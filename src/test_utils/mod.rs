//! the test_utils folder here will share fixtures between unit tests of
//! different modules
mod common;
mod fixtures;
mod mock_server;

pub(crate) use common::*;
pub(crate) use fixtures::*;
pub(crate) use mock_server::*;
