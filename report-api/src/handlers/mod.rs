mod app;
mod report;

pub use app::add_routes;
