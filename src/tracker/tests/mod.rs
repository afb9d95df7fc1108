use super::test_helpers::*;
use super::*;
use crate::types::TaskStatus;
use std::time::Duration;

mod pipeline;
