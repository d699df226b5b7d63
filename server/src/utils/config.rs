use crate::utils::logging::*;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tokio::sync::RwLock;

pub const CONFIG_PATH: &str = "./vialvision.toml";

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

#[derive(Serialize, Deserialize, Debug)]
struct ConfigTable {
    #[serde(rename = "Config")]
    config: Config,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub http_server_bind_port: u16, //port
    pub bind_retry_duration: u64, //seconds
    pub positive_label: String,
    pub default_confidence: f32, //ratio
    pub default_rotation: u16, //degrees
    pub default_flip: bool,
    pub default_frame_rate: u32, //frames per second
    pub max_frame_rate: u32, //frames per second
    pub capture_source: String, //gstreamer description
    pub capture_timeout: u64, //milliseconds
    pub detector_program: String, //path
    pub detector_script: String, //path
    pub model_path: String, //path
    pub detector_timeout: u64, //seconds
    pub database_path: String, //path
    pub results_folder: String, //path
    pub max_history: usize, //records
    pub max_page_size: usize, //records
    pub font_path: String, //path
    pub font_size: f32, //points
    pub border_width: u32, //pixels
    pub positive_color: [u8; 3], //RGB
    pub negative_color: [u8; 3], //RGB
    pub text_color: [u8; 3], //RGB
    pub jpeg_quality: u8, //percent
}

impl Config {
    pub fn new() -> Self {
        //Seriously, the program must be terminated.
        match Self::from_file(CONFIG_PATH) {
            Ok(config) => config,
            Err((entry, reason)) => {
                logging_console!(emergency_entry!(entry, reason));
                panic!("Seriously, the program must be terminated.");
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, (SystemEntry, String)> {
        let toml_string = fs::read_to_string(path).map_err(|err| (SystemEntry::ConfigNotFound, format!("Err: {err}")))?;
        Self::from_toml(&toml_string)
    }

    pub fn from_toml(toml_string: &str) -> Result<Self, (SystemEntry, String)> {
        let config_table = toml::from_str::<ConfigTable>(toml_string).map_err(|err| (SystemEntry::ConfigParseError, format!("Err: {err}")))?;
        let config = config_table.config;
        if !Self::validate(&config) {
            return Err((SystemEntry::InvalidConfig, String::new()));
        }
        Ok(config)
    }

    pub async fn now() -> Config {
        CONFIG.read().await.clone()
    }

    pub async fn update(config: Config) {
        *CONFIG.write().await = config
    }

    pub async fn save(config: &Config) -> Result<(), String> {
        let table = ConfigTable { config: config.clone() };
        let toml_string = toml::to_string_pretty(&table).map_err(|err| IOEntry::TomlSerializeError(err).to_string())?;
        let path = Path::new(CONFIG_PATH);
        tokio::fs::write(path, toml_string).await.map_err(|err| IOEntry::WriteFileError(path.display(), err).to_string())
    }

    /// Names the fields that differ from `self` but are only read when the
    /// server starts.
    pub fn startup_fields_changed(&self, other: &Config) -> Vec<&'static str> {
        let fields = [
            ("http_server_bind_port", self.http_server_bind_port != other.http_server_bind_port),
            ("bind_retry_duration", self.bind_retry_duration != other.bind_retry_duration),
            ("positive_label", self.positive_label != other.positive_label),
            ("detector_program", self.detector_program != other.detector_program),
            ("detector_script", self.detector_script != other.detector_script),
            ("model_path", self.model_path != other.model_path),
            ("detector_timeout", self.detector_timeout != other.detector_timeout),
            ("database_path", self.database_path != other.database_path),
            ("results_folder", self.results_folder != other.results_folder),
            ("max_history", self.max_history != other.max_history),
            ("font_path", self.font_path != other.font_path),
            ("font_size", self.font_size != other.font_size),
            ("border_width", self.border_width != other.border_width),
            ("positive_color", self.positive_color != other.positive_color),
            ("negative_color", self.negative_color != other.negative_color),
            ("text_color", self.text_color != other.text_color),
            ("jpeg_quality", self.jpeg_quality != other.jpeg_quality),
        ];
        fields.into_iter().filter(|(_, changed)| *changed).map(|(name, _)| name).collect()
    }

    pub fn validate(config: &Config) -> bool {
        Config::validate_port(config.http_server_bind_port)
            && Config::validate_second(config.bind_retry_duration)
            && Config::validate_text(&config.positive_label)
            && Config::validate_confidence(config.default_confidence)
            && Config::validate_rotation(config.default_rotation)
            && Config::validate_frame_rate(config.default_frame_rate, config.max_frame_rate)
            && Config::validate_text(&config.capture_source)
            && Config::validate_mini_second(config.capture_timeout)
            && Config::validate_text(&config.detector_program)
            && Config::validate_text(&config.detector_script)
            && Config::validate_text(&config.model_path)
            && Config::validate_second(config.detector_timeout)
            && Config::validate_text(&config.database_path)
            && Config::validate_text(&config.results_folder)
            && Config::validate_count(config.max_history)
            && Config::validate_count(config.max_page_size)
            && Config::validate_font_size(config.font_size)
            && Config::validate_border_width(config.border_width)
            && Config::validate_jpeg_quality(config.jpeg_quality)
    }

    pub fn validate_confidence(confidence: f32) -> bool {
        (0.0..=1.0).contains(&confidence)
    }

    pub fn validate_rotation(rotation: u16) -> bool {
        matches!(rotation, 0 | 90 | 180 | 270)
    }

    pub fn validate_frame_rate(frame_rate: u32, max_frame_rate: u32) -> bool {
        (1..=max_frame_rate).contains(&frame_rate) && max_frame_rate <= 60
    }

    fn validate_port(port: u16) -> bool {
        port > 0
    }

    fn validate_mini_second(second: u64) -> bool {
        second > 0 && second <= 60000
    }

    fn validate_second(second: u64) -> bool {
        second > 0 && second <= 3600
    }

    fn validate_text(text: &str) -> bool {
        !text.trim().is_empty()
    }

    fn validate_count(count: usize) -> bool {
        count > 0
    }

    fn validate_border_width(width: u32) -> bool {
        width > 0_u32
    }

    fn validate_font_size(size: f32) -> bool {
        size > 0_f32
    }

    fn validate_jpeg_quality(quality: u8) -> bool {
        (1..=100).contains(&quality)
    }
}
