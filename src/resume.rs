use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::Method;
use serde::Deserialize;
use serde::de::IgnoredAny;

use crate::api::{ApiClient, Payload, RequestOptions};
use crate::error::Error;
use crate::toast::Toaster;

/// The job seeker's uploaded resume.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct Resume {
    pub filename: String,
    pub url: String,
}

#[derive(Deserialize)]
struct ProfileBody {
    #[serde(default)]
    data: Option<ProfileData>,
}

#[derive(Deserialize)]
struct ProfileData {
    #[serde(rename = "jobSeeker", default)]
    job_seeker: Option<JobSeekerData>,
}

#[derive(Deserialize)]
struct JobSeekerData {
    #[serde(default)]
    resume: Option<Resume>,
}

#[derive(Deserialize)]
struct UploadBody {
    data: UploadData,
}

#[derive(Deserialize)]
struct UploadData {
    resume: Resume,
}

fn mime_for(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => {
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        }
        _ => None,
    }
}

impl ApiClient {
    /// Resume on file for the signed-in job seeker, if any.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn current_resume(&self) -> Result<Option<Resume>, Error> {
        let body: ProfileBody = self.get("/api/jobseeker/profile").await?;
        Ok(body
            .data
            .and_then(|d| d.job_seeker)
            .and_then(|j| j.resume))
    }

    /// Upload (or replace) the resume as multipart field `resume`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an empty file, otherwise the API error.
    pub async fn upload_resume(&self, filename: &str, bytes: Vec<u8>) -> Result<Resume, Error> {
        if bytes.is_empty() {
            return Err(Error::Validation("Please select a file.".into()));
        }
        let payload = Payload::File {
            field: "resume",
            filename: filename.to_owned(),
            bytes,
            mime: mime_for(filename).map(str::to_owned),
        };
        let body: UploadBody = self
            .request(
                Method::POST,
                "/api/jobseeker/resume",
                payload,
                RequestOptions::default(),
            )
            .await?;
        tracing::info!(filename = %body.data.resume.filename, "Resume uploaded");
        Ok(body.data.resume)
    }

    /// Remove the resume on file.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn delete_resume(&self) -> Result<(), Error> {
        let _: IgnoredAny = self.delete("/api/jobseeker/resume").await?;
        tracing::info!("Resume deleted");
        Ok(())
    }
}

/// State behind the resume upload widget: the current file plus toasts for
/// each action.
pub struct ResumeWidget<T> {
    api: ApiClient,
    toaster: Arc<T>,
    current: Mutex<Option<Resume>>,
}

impl<T: Toaster> ResumeWidget<T> {
    /// Widget with no resume loaded yet.
    #[must_use]
    pub fn new(api: ApiClient, toaster: Arc<T>) -> Self {
        Self {
            api,
            toaster,
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Resume>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last resume loaded or uploaded.
    #[must_use]
    pub fn current(&self) -> Option<Resume> {
        self.slot().clone()
    }

    /// Fetch the resume on file. Skipped when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns the API error.
    pub async fn load(&self) -> Result<Option<Resume>, Error> {
        if !self.api.session().is_authenticated() {
            return Ok(None);
        }
        let resume = self.api.current_resume().await?;
        self.slot().clone_from(&resume);
        Ok(resume)
    }

    /// Upload a file and report the outcome as a toast.
    ///
    /// # Errors
    ///
    /// Returns the validation or API error after toasting it.
    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<Resume, Error> {
        match self.api.upload_resume(filename, bytes).await {
            Ok(resume) => {
                *self.slot() = Some(resume.clone());
                self.toaster.success("Resume uploaded!");
                Ok(resume)
            }
            Err(e) => {
                self.toaster.error(&e.to_string());
                Err(e)
            }
        }
    }

    /// Delete the resume and report the outcome as a toast.
    ///
    /// # Errors
    ///
    /// Returns the API error after toasting it.
    pub async fn delete(&self) -> Result<(), Error> {
        match self.api.delete_resume().await {
            Ok(()) => {
                *self.slot() = None;
                self.toaster.success("Resume deleted");
                Ok(())
            }
            Err(e) => {
                self.toaster.error(&e.to_string());
                Err(e)
            }
        }
    }
}
