use crate::capture::capture_device::CaptureDevice;
use crate::detection::annotator::Annotator;
use crate::detection::detector::ScriptDetector;
use crate::history::sqlite_history::SqliteHistory;
use crate::measurement::pipeline::FramePipeline;
use crate::server::services::Services;
use crate::utils::config::Config;
use crate::utils::logging::*;
use crate::web::api::{config, health, history, log, predict, stream};
use actix_web::{web, App, HttpServer};
use common::mpn::measurement::MeasurementAssembler;
use common::mpn::pattern_resolver::{PatternResolver, PositiveLabel};
use common::mpn::reference_table::ReferenceTable;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

pub struct Server;

impl Server {
    pub async fn run() {
        logging_information!(SystemEntry::Initializing);
        let config = Config::now().await;
        logging_information!(SystemEntry::ReferenceTableReady(ReferenceTable::instance().len()));
        if let Err(err) = gstreamer::init() {
            logging_critical!(GStreamerEntry::InitializeError(err));
        }
        let Some(services) = Self::build_services(&config).await else {
            return;
        };
        let http_server = loop {
            let config = Config::now().await;
            let services = services.clone();
            let http_server = HttpServer::new(move || {
                let cors = actix_cors::Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600);
                App::new()
                    .wrap(cors)
                    .app_data(web::Data::new(services.clone()))
                    .service(config::initialize())
                    .service(health::initialize())
                    .service(history::initialize())
                    .service(log::initialize())
                    .service(predict::initialize())
                    .service(stream::initialize())
            })
            .bind(format!("0.0.0.0:{}", config.http_server_bind_port));
            match http_server {
                Ok(http_server) => break http_server,
                Err(err) => {
                    logging_critical!(NetworkEntry::BindPortError(err));
                    sleep(Duration::from_secs(config.bind_retry_duration)).await;
                    continue;
                }
            }
        };
        logging_information!(SystemEntry::WebReady);
        logging_information!(SystemEntry::InitializeComplete);
        logging_information!(SystemEntry::Online);
        if let Err(err) = http_server.run().await {
            logging_emergency!(SystemEntry::WebPanic(err));
        }
    }

    pub async fn terminate() {
        logging_information!(SystemEntry::Terminating);
        logging_information!(SystemEntry::TerminateComplete);
    }

    async fn build_services(config: &Config) -> Option<Services> {
        let history = match SqliteHistory::from_config(config) {
            Ok(history) => history,
            Err(err) => {
                logging_emergency!(HistoryEntry::WorkerFailure(err.to_string()));
                return None;
            }
        };
        logging_information!(HistoryEntry::DatabaseReady(config.database_path.clone()));
        if let Err(err) = history.prune().await {
            logging_warning!(HistoryEntry::WorkerFailure(err.to_string()));
        }
        let annotator = Arc::new(Annotator::from_config(config).await);
        let detector = Arc::new(ScriptDetector::new(config));
        let resolver = PatternResolver::new(ReferenceTable::instance(), PositiveLabel::new(config.positive_label.clone()));
        let assembler = MeasurementAssembler::new(resolver);
        let pipeline = Arc::new(FramePipeline::new(detector, assembler, annotator, config.jpeg_quality));
        Some(Services::new(pipeline, Arc::new(history), CaptureDevice::opener()))
    }
}
