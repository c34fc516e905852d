// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Decoding of the mailbox status byte.

crate::bitfield_enum! {
    name = MailboxStatus,
    description = "Completion state of the last mailbox operation, in bits 3:2 of the status byte.",
    bits = 3:2,
    variants = {
        0b00, Idle, "Idle",
        0b01, Done, "Done",
        0b10, Error, "Error",
    },
}
