pub mod memory;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::{
    Activity, ActivityPatch, Course, CoursePatch, NewActivityRequest, NewCourseRequest,
    NewReprogrammingLog, NewSubtaskRequest, ReprogrammingLog, ReprogrammingLogPatch, Subtask,
    SubtaskPatch,
};

pub use memory::InMemoryGateway;

/// Typed access to the backend resources. One request per call, no retries,
/// no caching; errors are handed to the caller untouched.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError>;
    async fn get_course(&self, id: i64) -> Result<Course, AppError>;
    async fn create_course(&self, req: &NewCourseRequest) -> Result<Course, AppError>;
    async fn update_course(&self, id: i64, req: &NewCourseRequest) -> Result<Course, AppError>;
    async fn patch_course(&self, id: i64, patch: &CoursePatch) -> Result<Course, AppError>;
    async fn delete_course(&self, id: i64) -> Result<(), AppError>;

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError>;
    async fn get_activity(&self, id: i64) -> Result<Activity, AppError>;
    async fn create_activity(&self, req: &NewActivityRequest) -> Result<Activity, AppError>;
    async fn update_activity(&self, id: i64, req: &NewActivityRequest) -> Result<Activity, AppError>;
    async fn patch_activity(&self, id: i64, patch: &ActivityPatch) -> Result<Activity, AppError>;
    async fn delete_activity(&self, id: i64) -> Result<(), AppError>;

    async fn list_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError>;
    async fn get_subtask(&self, activity_id: i64, id: i64) -> Result<Subtask, AppError>;
    async fn create_subtask(&self, activity_id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError>;
    async fn update_subtask(&self, activity_id: i64, id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError>;
    async fn patch_subtask(&self, activity_id: i64, id: i64, patch: &SubtaskPatch) -> Result<Subtask, AppError>;
    async fn delete_subtask(&self, activity_id: i64, id: i64) -> Result<(), AppError>;

    async fn list_logs(&self) -> Result<Vec<ReprogrammingLog>, AppError>;
    async fn get_log(&self, id: i64) -> Result<ReprogrammingLog, AppError>;
    async fn create_log(&self, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError>;
    async fn update_log(&self, id: i64, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError>;
    async fn patch_log(&self, id: i64, patch: &ReprogrammingLogPatch) -> Result<ReprogrammingLog, AppError>;
    async fn delete_log(&self, id: i64) -> Result<(), AppError>;
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::from_backend(status.as_u16(), &body));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            error!("Failed to parse backend response: {}", e);
            AppError::Decode(e.to_string())
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        debug!("GET {}", path);
        let response = self.client.get(self.url(path)).send().await?;
        Self::read(response).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, AppError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("{} {}", method, path);
        let response = self
            .client
            .request(method, self.url(path))
            .json(body)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        debug!("DELETE {}", path);
        let response = self.client.delete(self.url(path)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::from_backend(status.as_u16(), &body));
        }
        Ok(())
    }
}

fn course_path(id: i64) -> String {
    format!("course/{}/", id)
}

fn activity_path(id: i64) -> String {
    format!("activity/{}/", id)
}

fn subtasks_path(activity_id: i64) -> String {
    format!("activity/{}/subtasks/", activity_id)
}

fn subtask_path(activity_id: i64, id: i64) -> String {
    format!("activity/{}/subtasks/{}/", activity_id, id)
}

fn log_path(id: i64) -> String {
    format!("reprogramming_log/{}/", id)
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list_courses(&self) -> Result<Vec<Course>, AppError> {
        self.get("course/").await
    }

    async fn get_course(&self, id: i64) -> Result<Course, AppError> {
        self.get(&course_path(id)).await
    }

    async fn create_course(&self, req: &NewCourseRequest) -> Result<Course, AppError> {
        self.send(Method::POST, "course/", req).await
    }

    async fn update_course(&self, id: i64, req: &NewCourseRequest) -> Result<Course, AppError> {
        self.send(Method::PUT, &course_path(id), req).await
    }

    async fn patch_course(&self, id: i64, patch: &CoursePatch) -> Result<Course, AppError> {
        self.send(Method::PATCH, &course_path(id), patch).await
    }

    async fn delete_course(&self, id: i64) -> Result<(), AppError> {
        self.delete(&course_path(id)).await
    }

    async fn list_activities(&self) -> Result<Vec<Activity>, AppError> {
        self.get("activity/").await
    }

    async fn get_activity(&self, id: i64) -> Result<Activity, AppError> {
        self.get(&activity_path(id)).await
    }

    async fn create_activity(&self, req: &NewActivityRequest) -> Result<Activity, AppError> {
        self.send(Method::POST, "activity/", req).await
    }

    async fn update_activity(&self, id: i64, req: &NewActivityRequest) -> Result<Activity, AppError> {
        self.send(Method::PUT, &activity_path(id), req).await
    }

    async fn patch_activity(&self, id: i64, patch: &ActivityPatch) -> Result<Activity, AppError> {
        self.send(Method::PATCH, &activity_path(id), patch).await
    }

    async fn delete_activity(&self, id: i64) -> Result<(), AppError> {
        self.delete(&activity_path(id)).await
    }

    async fn list_subtasks(&self, activity_id: i64) -> Result<Vec<Subtask>, AppError> {
        self.get(&subtasks_path(activity_id)).await
    }

    async fn get_subtask(&self, activity_id: i64, id: i64) -> Result<Subtask, AppError> {
        self.get(&subtask_path(activity_id, id)).await
    }

    async fn create_subtask(&self, activity_id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
        self.send(Method::POST, &subtasks_path(activity_id), req).await
    }

    async fn update_subtask(&self, activity_id: i64, id: i64, req: &NewSubtaskRequest) -> Result<Subtask, AppError> {
        self.send(Method::PUT, &subtask_path(activity_id, id), req).await
    }

    async fn patch_subtask(&self, activity_id: i64, id: i64, patch: &SubtaskPatch) -> Result<Subtask, AppError> {
        self.send(Method::PATCH, &subtask_path(activity_id, id), patch).await
    }

    async fn delete_subtask(&self, activity_id: i64, id: i64) -> Result<(), AppError> {
        self.delete(&subtask_path(activity_id, id)).await
    }

    async fn list_logs(&self) -> Result<Vec<ReprogrammingLog>, AppError> {
        self.get("reprogramming_log/").await
    }

    async fn get_log(&self, id: i64) -> Result<ReprogrammingLog, AppError> {
        self.get(&log_path(id)).await
    }

    async fn create_log(&self, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
        self.send(Method::POST, "reprogramming_log/", req).await
    }

    async fn update_log(&self, id: i64, req: &NewReprogrammingLog) -> Result<ReprogrammingLog, AppError> {
        self.send(Method::PUT, &log_path(id), req).await
    }

    async fn patch_log(&self, id: i64, patch: &ReprogrammingLogPatch) -> Result<ReprogrammingLog, AppError> {
        self.send(Method::PATCH, &log_path(id), patch).await
    }

    async fn delete_log(&self, id: i64) -> Result<(), AppError> {
        self.delete(&log_path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths_carry_both_ids() {
        assert_eq!(subtasks_path(4), "activity/4/subtasks/");
        assert_eq!(subtask_path(4, 19), "activity/4/subtasks/19/");
        assert_eq!(log_path(2), "reprogramming_log/2/");
    }

    #[test]
    fn urls_join_on_the_api_base() {
        let config = AppConfig::default();
        let gateway = HttpGateway::new(&config).unwrap();
        assert_eq!(gateway.url("course/"), "http://localhost:8000/api/course/");
    }
}
