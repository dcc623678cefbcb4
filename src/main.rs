mod app;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Radial Scope",
        native_options,
        Box::new(|cc| Ok(Box::new(app::DiagramApp::new(cc)))),
    )
}
