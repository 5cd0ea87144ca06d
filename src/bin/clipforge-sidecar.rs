use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use clipforge_core::config::PipelineOptions;
use clipforge_core::error::AppError;
use clipforge_core::ffmpeg::{CancelFlag, parse_ffmpeg_error};
use clipforge_core::sidecar_api::{self, SidecarContext};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct RpcRequest {
    id: u64,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcSuccess {
    id: u64,
    result: Value,
}

#[derive(Debug, serde::Serialize)]
struct RpcFailure {
    id: u64,
    error: RpcErrorPayload,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RpcErrorPayload {
    summary: String,
    detail: String,
}

#[derive(Debug, serde::Serialize)]
struct RpcEvent {
    event: String,
    payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
enum JobKind {
    Clips,
    MobileClips,
    AiThumbnails,
}

#[derive(Debug, Clone)]
struct ActiveJob {
    job_id: u64,
    kind: JobKind,
    cancel: CancelFlag,
}

#[derive(Clone)]
struct JobState {
    active_job: Arc<Mutex<Option<ActiveJob>>>,
    next_job_id: Arc<AtomicU64>,
}

impl JobState {
    fn new() -> Self {
        Self {
            active_job: Arc::new(Mutex::new(None)),
            next_job_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn begin_job(&self, kind: JobKind) -> Result<ActiveJob, AppError> {
        let mut guard = self.active_job.lock();
        if let Some(existing) = guard.as_ref() {
            return Err(AppError::from(format!(
                "Another job is already running (jobId={}, kind={:?})",
                existing.job_id, existing.kind
            )));
        }
        let job = ActiveJob {
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed),
            kind,
            cancel: CancelFlag::new(),
        };
        *guard = Some(job.clone());
        Ok(job)
    }

    fn finish_job(&self, job_id: u64) {
        let mut guard = self.active_job.lock();
        if guard.as_ref().is_some_and(|active| active.job_id == job_id) {
            *guard = None;
        }
    }

    fn current_job(&self) -> Option<ActiveJob> {
        self.active_job.lock().clone()
    }
}

struct ActiveJobGuard {
    state: JobState,
    job_id: u64,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.state.finish_job(self.job_id);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectParams {
    project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSourceParams {
    project_id: String,
    source_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateParams {
    project_id: String,
    #[serde(default)]
    source_path: Option<PathBuf>,
    #[serde(default)]
    options: Option<PipelineOptions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateParams {
    project_id: String,
    language: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeParams {
    path: PathBuf,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CancelParams {
    job_id: Option<u64>,
}

type SharedWriter = Arc<Mutex<io::Stdout>>;

fn write_json_line<T: serde::Serialize>(writer: &mut impl Write, value: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, value)
        .map_err(|e| io::Error::other(format!("serialize response: {}", e)))?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn write_json_line_shared<T: serde::Serialize>(writer: &SharedWriter, value: &T) -> io::Result<()> {
    let mut guard = writer.lock();
    write_json_line(&mut *guard, value)
}

fn emit_job_event(
    writer: &SharedWriter,
    event: &str,
    job: &ActiveJob,
    error: Option<&RpcErrorPayload>,
) {
    let mut payload = json!({ "jobId": job.job_id, "kind": job.kind });
    if let Some(error) = error {
        payload["summary"] = Value::String(error.summary.clone());
        payload["detail"] = Value::String(error.detail.clone());
    }
    let message = RpcEvent {
        event: event.to_string(),
        payload,
    };
    let _ = write_json_line_shared(writer, &message);
}

fn parse_error_payload(err: &AppError) -> RpcErrorPayload {
    match err {
        AppError::FfmpegFailed { code, stderr } if *code == -1 => RpcErrorPayload {
            summary: stderr.clone(),
            detail: stderr.clone(),
        },
        AppError::FfmpegFailed { code, stderr } => {
            let parsed = parse_ffmpeg_error(stderr, Some(*code));
            RpcErrorPayload {
                summary: parsed.summary,
                detail: parsed.detail,
            }
        }
        AppError::ExecutorUnavailable(hint) => RpcErrorPayload {
            summary: "FFmpeg is not available.".to_string(),
            detail: hint.clone(),
        },
        _ => {
            let text = err.to_string();
            RpcErrorPayload {
                summary: text.clone(),
                detail: text,
            }
        }
    }
}

fn params_from_value<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| AppError::invalid_input(format!("Invalid params payload: {}", e)))
}

fn to_result_value<T: serde::Serialize>(value: T, what: &str) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::from(format!("Failed to serialize {}: {}", what, e)))
}

fn job_kind(method: &str) -> Option<JobKind> {
    match method {
        "clips.generate" => Some(JobKind::Clips),
        "clips.mobile" => Some(JobKind::MobileClips),
        "thumbnails.ai" => Some(JobKind::AiThumbnails),
        _ => None,
    }
}

fn dispatch_sync(
    method: &str,
    params: Value,
    ctx: &SidecarContext,
    jobs: &JobState,
) -> Result<Value, AppError> {
    match method {
        "app.capabilities" => {
            to_result_value(sidecar_api::app_capabilities(ctx)?, "app capabilities")
        }
        "project.registerSource" => {
            let p: RegisterSourceParams = params_from_value(params)?;
            let result = sidecar_api::register_source(ctx, p.project_id, p.source_path)?;
            to_result_value(result, "registration")
        }
        "clips.list" => {
            let p: ProjectParams = params_from_value(params)?;
            to_result_value(sidecar_api::list_clips(ctx, p.project_id)?, "clip list")
        }
        "captions.generate" => {
            let p: ProjectParams = params_from_value(params)?;
            to_result_value(sidecar_api::generate_captions(ctx, p.project_id)?, "captions")
        }
        "captions.translate" => {
            let p: TranslateParams = params_from_value(params)?;
            let result = sidecar_api::translate_captions(ctx, p.project_id, p.language)?;
            to_result_value(result, "captions")
        }
        "media.probe" => {
            let p: ProbeParams = params_from_value(params)?;
            to_result_value(sidecar_api::probe_media(ctx, p.path)?, "media info")
        }
        "clips.cancel" => {
            let p: CancelParams = if params.is_null() {
                CancelParams::default()
            } else {
                params_from_value(params)?
            };
            match (jobs.current_job(), p.job_id) {
                (None, Some(job_id)) => Err(AppError::not_found(format!(
                    "Unknown jobId: {}",
                    job_id
                ))),
                (None, None) => Ok(json!({ "cancelled": false, "jobId": Value::Null })),
                (Some(active), Some(job_id)) if active.job_id != job_id => Err(
                    AppError::not_found(format!("Unknown jobId: {}", job_id)),
                ),
                (Some(active), _) => {
                    active.cancel.cancel();
                    Ok(json!({ "cancelled": true, "jobId": active.job_id }))
                }
            }
        }
        _ => Err(AppError::invalid_input(format!("Unknown method: {}", method))),
    }
}

fn run_job(
    method: &str,
    params: Value,
    ctx: &SidecarContext,
    cancel: CancelFlag,
) -> Result<Value, AppError> {
    match method {
        "clips.generate" => {
            let p: GenerateParams = params_from_value(params)?;
            let result = sidecar_api::generate_clips(
                ctx,
                p.project_id,
                p.source_path,
                p.options,
                Some(cancel),
            )?;
            to_result_value(result, "clips")
        }
        "clips.mobile" => {
            let p: GenerateParams = params_from_value(params)?;
            let result =
                sidecar_api::generate_mobile_clips(ctx, p.project_id, p.options, Some(cancel))?;
            to_result_value(result, "clips")
        }
        "thumbnails.ai" => {
            let p: ProjectParams = params_from_value(params)?;
            let result = sidecar_api::generate_ai_thumbnails(ctx, p.project_id, Some(cancel))?;
            to_result_value(result, "thumbnails")
        }
        _ => Err(AppError::invalid_input(format!("Unknown job method: {}", method))),
    }
}

fn write_response(writer: &SharedWriter, id: u64, outcome: Result<Value, AppError>) {
    let response = match outcome {
        Ok(result) => serde_json::to_value(RpcSuccess { id, result })
            .map_err(|e| io::Error::other(format!("serialize success: {}", e))),
        Err(err) => serde_json::to_value(RpcFailure {
            id,
            error: parse_error_payload(&err),
        })
        .map_err(|e| io::Error::other(format!("serialize failure: {}", e))),
    };

    match response {
        Ok(value) => {
            let _ = write_json_line_shared(writer, &value);
        }
        Err(err) => {
            let failure = RpcFailure {
                id,
                error: RpcErrorPayload {
                    summary: "Serialization error".to_string(),
                    detail: err.to_string(),
                },
            };
            let _ = write_json_line_shared(writer, &failure);
        }
    }
}

fn handle_job(
    request: RpcRequest,
    active_job: ActiveJob,
    writer: &SharedWriter,
    ctx: &SidecarContext,
    jobs: &JobState,
) {
    let _job_guard = ActiveJobGuard {
        state: jobs.clone(),
        job_id: active_job.job_id,
    };
    let outcome = run_job(
        &request.method,
        request.params,
        ctx,
        active_job.cancel.clone(),
    );
    match &outcome {
        Ok(_) => emit_job_event(writer, "job.complete", &active_job, None),
        Err(err) => {
            let payload = parse_error_payload(err);
            emit_job_event(writer, "job.error", &active_job, Some(&payload));
        }
    }
    write_response(writer, request.id, outcome);
}

fn main() -> io::Result<()> {
    // stdout carries protocol lines only.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let ctx = SidecarContext::from_env();
    let stdin = io::stdin();
    let stdout: SharedWriter = Arc::new(Mutex::new(io::stdout()));
    let jobs = JobState::new();
    let mut job_workers: Vec<thread::JoinHandle<()>> = Vec::new();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid input stream".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let request: RpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                let failure = RpcFailure {
                    id: 0,
                    error: RpcErrorPayload {
                        summary: "Invalid request".to_string(),
                        detail: err.to_string(),
                    },
                };
                let _ = write_json_line_shared(&stdout, &failure);
                continue;
            }
        };

        if let Some(kind) = job_kind(&request.method) {
            // Registered before the worker starts so a following
            // clips.cancel always sees it.
            let active_job = match jobs.begin_job(kind) {
                Ok(job) => job,
                Err(err) => {
                    write_response(&stdout, request.id, Err(err));
                    continue;
                }
            };
            emit_job_event(&stdout, "job.started", &active_job, None);
            let writer = Arc::clone(&stdout);
            let job_ctx = ctx.clone();
            let job_state = jobs.clone();
            job_workers.push(thread::spawn(move || {
                handle_job(request, active_job, &writer, &job_ctx, &job_state);
            }));
        } else {
            let outcome = dispatch_sync(&request.method, request.params, &ctx, &jobs);
            write_response(&stdout, request.id, outcome);
        }
    }

    for worker in job_workers {
        let _ = worker.join();
    }
    Ok(())
}
