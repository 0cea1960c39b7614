//! Shelfscan Library
//!
//! Inventory for small retail shops with camera barcode scanning.
//! The core is the camera session lifecycle: acquiring a camera under
//! device-dependent constraints, binding it to a pluggable decoder, and
//! releasing it deterministically however the scan ends.
//!
//! # Architecture
//!
//! ```text
//! host ──start/stop/dispose──▶ CameraSessionManager ──ScanEvent──▶ host
//!                                 │            │
//!                      CameraPlatform     DecoderFactory
//!
//! decoded code ──▶ ProductStore ◀──▶ StorageBackend (JSON under a fixed key)
//! ```
//!
//! # Design Principles
//!
//! - **One session per surface**: a start while not idle is rejected
//! - **Release before notify**: the camera is stopped before a result is delivered
//! - **Late events are dropped**: a cancelled session ignores its decoder
//! - **Failures are recoverable**: every error leaves the manager idle
//!
//! # Example
//!
//! ```no_run
//! use shelfscan::{
//!     capture::{CameraDevice, MockCameraPlatform},
//!     inventory::{MemoryStorage, ProductStore},
//!     scanner::{CameraSessionManager, MockDecoderFactory, ScanEvent, SessionConfig},
//! };
//!
//! let platform = MockCameraPlatform::with_devices(vec![
//!     CameraDevice::new("0", "Front Camera"),
//!     CameraDevice::new("1", "Back Camera"),
//! ]);
//! let decoders = MockDecoderFactory::new();
//! let mut scanner = CameraSessionManager::new(platform, decoders, SessionConfig::default());
//! let events = scanner.subscribe();
//! let store = ProductStore::load(MemoryStorage::new());
//!
//! scanner.start_scanning().unwrap();
//! scanner.decoders().last().unwrap().detect("6901234567892");
//! scanner.pump();
//!
//! for event in events.try_iter() {
//!     if let ScanEvent::Decoded(result) = event {
//!         match store.find_by_barcode(&result.code) {
//!             Some(product) => println!("{}: {:.2}", product.name, product.selling_price),
//!             None => println!("unknown barcode {}", result.code),
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod inventory;
pub mod metrics;
pub mod scanner;

// Re-export commonly used types at crate root
pub use capture::{CameraDevice, CameraPlatform, DeviceClass, MockCameraPlatform};
pub use config::FileConfig;
pub use inventory::{ImportOutcome, Product, ProductDraft, ProductStore};
pub use scanner::{CameraSessionManager, DecodedResult, ScanError, ScanEvent, SessionConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
