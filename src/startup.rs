use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use crate::classifier::{ImageClassifier, OnnxClassifier};
use crate::config::Settings;
use crate::handlers;
use crate::models::HealthReport;

// tract executes on the host CPU only.
const CPU_DEVICE: &str = "cpu";

/// Shared, read-only request state. The classifier is loaded once at startup
/// and never mutated; `None` puts `/predict` into degraded mode.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub classifier: Option<Arc<dyn ImageClassifier>>,
}

impl AppState {
    pub fn new(settings: Settings, classifier: Option<Arc<dyn ImageClassifier>>) -> Self {
        Self {
            settings: Arc::new(settings),
            classifier,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn device(&self) -> &str {
        self.classifier
            .as_deref()
            .map(|classifier| classifier.device())
            .unwrap_or(CPU_DEVICE)
    }

    pub fn health_report(&self) -> HealthReport {
        HealthReport {
            status: "ok".to_string(),
            model_loaded: self.model_loaded(),
            model_name: self.settings.model_name.clone(),
            device: self.device().to_string(),
            template_folder: self.settings.template_dir.display().to_string(),
            template_exists: self.settings.index_path().is_file(),
        }
    }
}

/// Best-effort, one-time model load. Failure is logged and the service keeps
/// running without a classifier.
pub fn load_classifier(settings: &Settings) -> Option<Arc<dyn ImageClassifier>> {
    tracing::info!(
        model = %settings.model_name,
        device = CPU_DEVICE,
        model_dir = %settings.model_dir.display(),
        "Loading model"
    );

    match OnnxClassifier::load(&settings.model_dir, &settings.model_name) {
        Ok(classifier) => {
            tracing::info!("Model loaded successfully.");
            let classifier: Arc<dyn ImageClassifier> = Arc::new(classifier);
            Some(classifier)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load model");
            None
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/predict").route(web::post().to(handlers::predict)))
        .service(web::resource("/health").route(web::get().to(handlers::health)));
}

pub async fn run(state: AppState) -> std::io::Result<()> {
    let (host, port) = state.settings.bind_address();
    let data = web::Data::new(state);

    tracing::info!("Server running at http://{}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(configure)
    })
    .bind((host, port))?
    .run()
    .await
}
