//! unpak provides support for reading game resource archives ("PAK"-style
//! containers). It can detect the container family, list the file tree an
//! archive describes, and extract individual file payloads into memory,
//! including payloads stored in numbered sibling archives.
//!
//! # Supported formats
//! | Format             | Support   | Notes                                            |
//! | ------------------ | --------- | ------------------------------------------------ |
//! | VPK v1             | &#x1F7E2; | Single-file or `_dir` index plus data archives   |
//! | VPK v2             | &#x1F7E2; | Checksum sections are read but not verified      |
//! | VPK directory file | &#x1F7E2; | `0x00465456` header variant                      |
//! | Unreal Engine 3    | &#x1F7E2; | `"Pak\0"` magic                                  |
//! | Unreal Engine 4/5  | &#x1F7E2; | `"PAK"`-prefixed magic                           |
//! | Generic            | &#x1F7E1; * | No index; extraction by caller-supplied ranges |
//!
//! * The generic decoder never produces a file tree; it exists so payloads can
//!   still be pulled out of containers unpak cannot parse.
//!
//! Archives are read-only: unpak never writes, decompresses, decrypts, or
//! verifies checksums.
//!
//! # Features
//! - `detect`: Format detection and the [`Archive`](archive::Archive) facade.
//! - `mem-map`: Use memory mapping to read payload data. This can be faster and
//!   use less memory, but is not supported on all platforms.
//!
//! **Note:** Enabling the `mem-map` feature requires additional dependencies (`filebuffer`).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod pak;
pub mod util;
pub mod validate;

#[cfg(feature = "detect")]
pub mod archive;

#[cfg(feature = "detect")]
pub mod detect;
