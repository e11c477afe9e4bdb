// ============================================================================
// FIRESTORE - Colección de cursos vía REST
// ============================================================================
// La API REST no tiene listeners: la entrega en tiempo real se emula con un
// único poller por colección que re-lee todo y solo entrega si cambió.
// Cada escritura propia adelanta la siguiente lectura.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, Either};
use gloo_net::http::{Request, RequestBuilder, Response};
use gloo_timers::future::TimeoutFuture;

use crate::config::AppConfig;
use crate::models::{Course, CoursePatch, NewCourse};
use crate::services::firebase::codec::{
    decode_course, encode_new_course, encode_patch, FirestoreDocument, ListDocumentsResponse,
};
use crate::services::firebase::FirebaseAuth;
use crate::services::subscription::Listeners;
use crate::services::{CourseCollection, ServiceError, SnapshotEvent, Subscription};

const PAGE_SIZE: &str = "300";

struct FirestoreInner {
    documents_url: String,
    api_key: String,
    auth: Option<FirebaseAuth>,
    poll_interval_ms: u32,
    listeners: Listeners<SnapshotEvent>,
    poller_running: Cell<bool>,
    last_snapshot: RefCell<Option<Vec<Course>>>,
    nudge: RefCell<Option<oneshot::Sender<()>>>,
}

/// Colección de Firestore ligada al nombre configurado
#[derive(Clone)]
pub struct FirestoreCollection {
    inner: Rc<FirestoreInner>,
}

fn network(e: gloo_net::Error) -> ServiceError {
    ServiceError::Network(e.to_string())
}

async fn check(response: Response) -> Result<Response, ServiceError> {
    if response.ok() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::from_status(status, &body))
}

impl FirestoreCollection {
    /// `None` si falta proyecto o API key
    pub fn new(config: &AppConfig, auth: Option<FirebaseAuth>) -> Option<Self> {
        let project_id = config.firebase.project_id.as_deref()?;
        let api_key = config.firebase.api_key.clone()?;
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            config.firebase.firestore_endpoint.trim_end_matches('/'),
            project_id,
            config.courses_collection
        );

        Some(Self {
            inner: Rc::new(FirestoreInner {
                documents_url,
                api_key,
                auth,
                poll_interval_ms: config.snapshot_poll_interval_ms,
                listeners: Listeners::new(),
                poller_running: Cell::new(false),
                last_snapshot: RefCell::new(None),
                nudge: RefCell::new(None),
            }),
        })
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.inner.documents_url, id)
    }

    /// API key + token vigente del usuario si hay sesión
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query([("key", self.inner.api_key.as_str())]);
        let token = match &self.inner.auth {
            Some(auth) => auth.id_token().await,
            None => None,
        };
        match token {
            Some(token) => request.header("Authorization", &format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Adelantar la próxima lectura del poller
    fn nudge(&self) {
        let nudge = self.inner.nudge.borrow_mut().take();
        if let Some(nudge) = nudge {
            let _ = nudge.send(());
        }
    }

    fn ensure_poller(&self) {
        if self.inner.poller_running.replace(true) {
            return;
        }
        let collection = self.clone();
        wasm_bindgen_futures::spawn_local(async move {
            collection.poll_loop().await;
            collection.inner.poller_running.set(false);
            collection.inner.last_snapshot.borrow_mut().take();
            log::info!("🔌 Poller de cursos detenido");
        });
    }

    async fn poll_loop(&self) {
        log::info!("📡 Poller de cursos iniciado ({} ms)", self.inner.poll_interval_ms);
        while self.inner.listeners.active() > 0 {
            match self.read_all().await {
                Ok(courses) => {
                    let changed = self.inner.last_snapshot.borrow().as_ref() != Some(&courses);
                    if changed {
                        *self.inner.last_snapshot.borrow_mut() = Some(courses.clone());
                        self.inner.listeners.broadcast(Ok(courses));
                    }
                }
                Err(e) => {
                    log::error!("❌ Error leyendo la colección: {}", e);
                    self.inner.listeners.broadcast(Err(e));
                    self.inner.listeners.clear();
                    return;
                }
            }

            let (sender, receiver) = oneshot::channel();
            *self.inner.nudge.borrow_mut() = Some(sender);
            let timer = Box::pin(TimeoutFuture::new(self.inner.poll_interval_ms));
            if let Either::Right(_) = future::select(timer, receiver).await {
                log::debug!("🔄 Lectura adelantada por una escritura");
            }
        }
    }
}

impl CourseCollection for FirestoreCollection {
    async fn read_all(&self) -> Result<Vec<Course>, ServiceError> {
        let mut courses = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = Request::get(&self.inner.documents_url).query([("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query([("pageToken", token.as_str())]);
            }

            let response = self.authorized(request).await.send().await.map_err(network)?;
            let page = check(response)
                .await?
                .json::<ListDocumentsResponse>()
                .await
                .map_err(|e| ServiceError::Decode(e.to_string()))?;

            for document in &page.documents {
                courses.push(decode_course(document)?);
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(courses)
    }

    async fn read_one(&self, id: &str) -> Result<Option<Course>, ServiceError> {
        let request = Request::get(&self.document_url(id));
        let response = self.authorized(request).await.send().await.map_err(network)?;
        if response.status() == 404 {
            return Ok(None);
        }

        let document = check(response)
            .await?
            .json::<FirestoreDocument>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        decode_course(&document).map(Some)
    }

    async fn create(&self, fields: &NewCourse) -> Result<String, ServiceError> {
        let body = encode_new_course(fields);
        let request = self
            .authorized(Request::post(&self.inner.documents_url))
            .await
            .json(&body)
            .map_err(network)?;

        let document = check(request.send().await.map_err(network)?)
            .await?
            .json::<FirestoreDocument>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))?;

        let id = document
            .id()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::Decode("respuesta sin id de documento".to_string()))?;
        self.nudge();
        Ok(id)
    }

    async fn update(&self, id: &str, patch: &CoursePatch) -> Result<(), ServiceError> {
        if patch.is_empty() {
            return Ok(());
        }
        let (body, mask) = encode_patch(patch);

        let mut request = Request::patch(&self.document_url(id)).query([("currentDocument.exists", "true")]);
        for field in mask {
            request = request.query([("updateMask.fieldPaths", field)]);
        }
        let request = self.authorized(request).await.json(&body).map_err(network)?;

        check(request.send().await.map_err(network)?).await?;
        self.nudge();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let request = Request::delete(&self.document_url(id));
        let response = self.authorized(request).await.send().await.map_err(network)?;
        check(response).await?;
        self.nudge();
        Ok(())
    }

    fn subscribe(&self) -> Subscription<SnapshotEvent> {
        // con el poller activo el último snapshot sirve como primera entrega
        let cached = if self.inner.poller_running.get() {
            self.inner.last_snapshot.borrow().clone()
        } else {
            None
        };

        let subscription = match cached {
            Some(courses) => self.inner.listeners.subscribe(Ok(courses)),
            None => {
                self.inner.last_snapshot.borrow_mut().take();
                self.nudge();
                self.inner.listeners.subscribe_pending()
            }
        };
        self.ensure_poller();
        subscription
    }
}
