mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;

fn main() {
    app::run();
}
