//! Holds the [`Error`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// The ways a scheduler call can fail
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No free task slot on that core, or no stack left to give the task
    ResourceExhausted,
    /// The core id is not below [`MAX_CPU_CORES`](crate::config::MAX_CPU_CORES),
    /// or the call is not allowed on that core
    InvalidCore,
    /// The call was made in the wrong scheduler state, e.g. starting twice
    PreconditionViolated,
    /// A bounded barrier wait ran out of ticks
    Timeout,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ResourceExhausted => write!(f, "no task slot or stack space left"),
            Error::InvalidCore => write!(f, "core id out of range or wrong for this call"),
            Error::PreconditionViolated => {
                write!(f, "scheduler is in the wrong state for this call")
            }
            Error::Timeout => write!(f, "barrier wait timed out"),
        }
    }
}

impl core::error::Error for Error {}

// End of File
