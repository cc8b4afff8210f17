mod controller;
mod source;

pub use controller::{TrackingController, TrackingState};
pub use source::{
    parse_fix_line, Fix, LineSource, ManualSource, PositionEvent, PositionSink, PositionSource,
    ReplaySource, Track, TrackErrorKind, TrackStep, UnavailableSource, WatchId, WatchOptions,
};
