// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

mod codec;
mod error;
mod frame;
mod master;
mod util;

pub mod slave;
pub mod transport;

#[cfg(feature = "rtu")]
pub use codec::rtu;
#[cfg(feature = "tcp")]
pub use codec::tcp;
pub use error::*;
pub use frame::*;
pub use master::Master;
pub use util::{
    bool_to_u16_coil, bools_to_byte, bytes_to_registers, pack_coils, packed_coils_len,
    registers_to_bytes, u16_coil_to_bool, unpack_coils,
};
