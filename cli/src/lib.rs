// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end: inspect compiled `CalDAV` filters and compute
//! free-busy from configured backends.

mod cli;
mod cmd_filter;
mod cmd_freebusy;
mod config;

pub use crate::cli::{Cli, Commands, run};
pub use crate::cmd_filter::CmdFilter;
pub use crate::cmd_freebusy::CmdFreeBusy;
