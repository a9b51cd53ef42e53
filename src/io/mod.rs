// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations: frame capture and polygon export.

pub mod media;
pub mod serialization;
