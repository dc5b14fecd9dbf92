use ai_image_detector::config::Settings;
use ai_image_detector::startup::{self, AppState};
use ai_image_detector::telemetry;
use anyhow::Context;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&settings.log_level, settings.log_format);

    tracing::info!(
        template_folder = %settings.template_dir.display(),
        index_exists = settings.index_path().is_file(),
        "Templates"
    );

    let classifier = startup::load_classifier(&settings);
    startup::run(AppState::new(settings, classifier))
        .await
        .context("HTTP server error")
}
