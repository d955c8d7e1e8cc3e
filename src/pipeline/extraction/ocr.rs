use std::path::{Path, PathBuf};
use std::process::Command;

use image::GrayImage;

use super::types::{OcrEngine, OcrSettings};
use super::ExtractionError;

/// Environment variable holding an explicit path to the tesseract executable.
pub const TESSERACT_PATH_ENV: &str = "TESSERACT_PATH";

/// Tesseract OCR driven through its command-line executable.
///
/// Constructed once at startup by [`TesseractCli::discover`]; the installed
/// language packs are listed at that point so unusable configurations can be
/// skipped without spawning a process.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    languages: Vec<String>,
}

impl TesseractCli {
    /// Probe for a working tesseract executable.
    ///
    /// Uses `TESSERACT_PATH` when set, otherwise `tesseract` from `PATH`.
    /// Returns `None` when no executable answers `--version`.
    pub fn discover() -> Option<Self> {
        let executable = std::env::var_os(TESSERACT_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tesseract"));
        match Self::at(&executable) {
            Ok(engine) => {
                tracing::info!(
                    executable = %engine.executable.display(),
                    languages = ?engine.languages,
                    "Tesseract OCR available"
                );
                Some(engine)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Tesseract OCR unavailable, OCR fallback disabled");
                None
            }
        }
    }

    /// Use a specific executable, failing if it cannot be run.
    pub fn at(executable: &Path) -> Result<Self, ExtractionError> {
        let version = Command::new(executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                ExtractionError::OcrUnavailable(format!(
                    "failed to run {}: {e}",
                    executable.display()
                ))
            })?;
        if !version.status.success() {
            return Err(ExtractionError::OcrUnavailable(format!(
                "{} --version exited with {}",
                executable.display(),
                version.status
            )));
        }

        let languages = Command::new(executable)
            .arg("--list-langs")
            .output()
            .map(|out| parse_language_list(&String::from_utf8_lossy(&out.stdout)))
            .unwrap_or_default();

        Ok(Self {
            executable: executable.to_path_buf(),
            languages,
        })
    }

    /// Run tesseract on `image` with extra arguments, returning stdout.
    fn run(&self, image: &GrayImage, args: &[&str]) -> Result<String, ExtractionError> {
        let input = tempfile::Builder::new()
            .prefix("laudo-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save(input.path())
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

        let output = Command::new(&self.executable)
            .arg(input.path())
            .arg("stdout")
            .args(args)
            .output()
            .map_err(|e| ExtractionError::OcrProcessing(format!("failed to run tesseract: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(
        &self,
        image: &GrayImage,
        settings: &OcrSettings,
    ) -> Result<String, ExtractionError> {
        let psm = settings.psm.to_string();
        self.run(image, &["--psm", &psm, "-l", &settings.lang])
    }

    fn detect_rotation(&self, image: &GrayImage) -> Result<u32, ExtractionError> {
        let osd = self.run(image, &["--psm", "0"])?;
        Ok(parse_osd_rotation(&osd).unwrap_or(0))
    }

    fn supports_lang(&self, lang: &str) -> bool {
        // An empty list means --list-langs failed; let tesseract decide.
        self.languages.is_empty()
            || lang
                .split('+')
                .all(|l| self.languages.iter().any(|have| have == l))
    }
}

/// Parse `tesseract --list-langs` output. The first line is a header.
fn parse_language_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the `Rotate: N` line of Tesseract orientation/script detection.
fn parse_osd_rotation(osd: &str) -> Option<u32> {
    osd.lines()
        .find_map(|line| line.trim().strip_prefix("Rotate:"))
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|r| matches!(r, 0 | 90 | 180 | 270))
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Returns the response registered for a configuration, otherwise the
/// default text. Configurations marked with `with_failure` return an error.
pub struct MockOcrEngine {
    pub text: String,
    pub rotation: u32,
    per_settings: Vec<(OcrSettings, String)>,
    failing: Vec<OcrSettings>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            rotation: 0,
            per_settings: Vec::new(),
            failing: Vec::new(),
        }
    }

    pub fn with_response(mut self, settings: OcrSettings, text: &str) -> Self {
        self.per_settings.push((settings, text.to_string()));
        self
    }

    pub fn with_rotation(mut self, degrees: u32) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_failure(mut self, settings: OcrSettings) -> Self {
        self.failing.push(settings);
        self
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(
        &self,
        _image: &GrayImage,
        settings: &OcrSettings,
    ) -> Result<String, ExtractionError> {
        if self.failing.contains(settings) {
            return Err(ExtractionError::OcrProcessing(format!(
                "mock failure for psm {} lang {}",
                settings.psm, settings.lang
            )));
        }
        let text = self
            .per_settings
            .iter()
            .find(|(s, _)| s == settings)
            .map(|(_, t)| t.clone())
            .unwrap_or_else(|| self.text.clone());
        Ok(text)
    }

    fn detect_rotation(&self, _image: &GrayImage) -> Result<u32, ExtractionError> {
        Ok(self.rotation)
    }
}
