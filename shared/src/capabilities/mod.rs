mod api;
mod timer;

pub use self::api::{Api, ApiOperation, ApiOutput, ApiResult};
pub use self::timer::{Timer, TimerOperation, TimerOutput};

pub use crux_core::render::Render;

// The Effect derive refers to the app by name.
use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub api: Api<Event>,
    pub timer: Timer<Event>,
}
