mod image;
mod routes;
mod server;
mod state;
mod ui;

pub use self::image::{frame_to_jpeg, multipart_part, EncodeError, BOUNDARY};
pub use server::{router, run_server};
pub use state::AppState;
