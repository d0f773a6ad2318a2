// Copyright (C) 2015-2025 The Neo Project.
//
// error.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Error types for the core crate.

use thiserror::Error;

/// Core type errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A value has the wrong shape for the requested conversion.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// What was wrong with the input.
        message: String,
    },

    /// An address failed base58check decoding or carries the wrong version.
    #[error("invalid address: {message}")]
    InvalidAddress {
        /// What was wrong with the address.
        message: String,
    },

    /// Binary data ended before a complete value could be read.
    #[error("unexpected end of data: need {need} more bytes at offset {offset}")]
    UnexpectedEof {
        /// Read position at which the data ran out.
        offset: usize,
        /// Number of missing bytes.
        need: usize,
    },

    /// A length prefix exceeds the allowed maximum.
    #[error("size {size} exceeds limit {limit}")]
    SizeExceeded {
        /// Declared size.
        size: usize,
        /// Allowed maximum.
        limit: usize,
    },
}

impl CoreError {
    /// Shorthand for an `InvalidFormat` error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        CoreError::InvalidFormat {
            message: message.into(),
        }
    }

    /// Shorthand for an `InvalidAddress` error.
    pub fn invalid_address(message: impl Into<String>) -> Self {
        CoreError::InvalidAddress {
            message: message.into(),
        }
    }
}
