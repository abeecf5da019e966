// SPDX-License-Identifier: MIT

//! Model access and LLM-backed nodes

pub mod error;
pub mod extract;
pub mod model;
