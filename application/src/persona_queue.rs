//! Persona generation queue
//!
//! Persona synthesis is the most expensive call in the system, so it runs
//! through a single background worker: one job at a time, de-duplicated by
//! (meeting, participant), short-circuiting when the persona already exists.
//! The turn engine can also create personas inline via [`ensure_persona`]
//! when a meeting starts before the queue caught up.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use roundtable_domain::{Persona, PersonaRole};

use crate::gateway::{GatewayError, ModelGateway};
use crate::ports::store::{MeetingStore, StoreError};

#[derive(Error, Debug)]
pub enum PersonaError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("persona generation failed: {0}")]
    Worker(String),
}

/// Fetch the persona for a participant, generating and persisting it when
/// missing.
///
/// The existence check runs again after the model call: a concurrent caller
/// may have won the race, in which case its persona is returned and the
/// freshly synthesized one is discarded.
pub async fn ensure_persona(
    store: &dyn MeetingStore,
    gateway: &ModelGateway,
    meeting_id: &str,
    participant_id: &str,
) -> Result<Persona, PersonaError> {
    if let Some(existing) = store
        .persona_for_participant(meeting_id, participant_id)
        .await?
    {
        return Ok(existing);
    }

    let meeting = store.meeting(meeting_id).await?;
    let participant = store
        .participants(meeting_id)
        .await?
        .into_iter()
        .find(|p| p.id == participant_id)
        .ok_or_else(|| StoreError::ParticipantNotFound(participant_id.to_string()))?;
    let input = store
        .inputs(meeting_id)
        .await?
        .into_iter()
        .find(|i| i.participant_id == participant_id)
        .map(|i| i.content)
        .unwrap_or_default();

    let synthesized = gateway
        .synthesize_persona(&input, &meeting.subject, Some(&participant.contact))
        .await?;

    if let Some(existing) = store
        .persona_for_participant(meeting_id, participant_id)
        .await?
    {
        debug!(
            meeting_id,
            participant_id, "persona appeared concurrently, using the persisted one"
        );
        return Ok(existing);
    }

    // The transcript tags humans and personas by name; the persona must not
    // shadow the participant's own handle.
    let mut name = synthesized.name;
    if collides(&name, &participant.contact) {
        name = format!("{name} (AI)");
    }

    let persona = Persona {
        id: uuid::Uuid::new_v4().to_string(),
        meeting_id: meeting_id.to_string(),
        participant_id: Some(participant_id.to_string()),
        role: PersonaRole::Participant,
        name,
        mcp: synthesized.mcp,
        created_at: chrono::Utc::now(),
    };
    store.insert_persona(persona.clone()).await?;
    info!(meeting_id, participant_id, name = %persona.name, "persona created");
    Ok(persona)
}

fn collides(name: &str, contact: &str) -> bool {
    let local = contact.split('@').next().unwrap_or(contact);
    name.eq_ignore_ascii_case(contact) || name.eq_ignore_ascii_case(local)
}

type JobKey = (String, String);

struct Job {
    meeting_id: String,
    participant_id: String,
    reply: oneshot::Sender<Result<Persona, PersonaError>>,
}

/// Completion handle for a queued synthesis job.
pub struct PersonaTicket(oneshot::Receiver<Result<Persona, PersonaError>>);

impl PersonaTicket {
    pub async fn wait(self) -> Result<Persona, PersonaError> {
        self.0
            .await
            .unwrap_or_else(|_| Err(PersonaError::Worker("queue worker stopped".to_string())))
    }
}

/// Handle to the background synthesis worker.
#[derive(Clone)]
pub struct PersonaQueue {
    tx: mpsc::Sender<Job>,
}

impl PersonaQueue {
    pub fn new(store: Arc<dyn MeetingStore>, gateway: Arc<ModelGateway>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(worker(store, gateway, rx));
        Self { tx }
    }

    /// Queue persona synthesis for a participant. Jobs for a pair already
    /// queued attach to the in-flight one instead of running twice.
    pub fn submit(&self, meeting_id: &str, participant_id: &str) -> PersonaTicket {
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            meeting_id: meeting_id.to_string(),
            participant_id: participant_id.to_string(),
            reply,
        };
        if let Err(rejected) = self.tx.try_send(job) {
            let job = rejected.into_inner();
            let _ = job
                .reply
                .send(Err(PersonaError::Worker("queue unavailable".to_string())));
        }
        PersonaTicket(receiver)
    }
}

async fn worker(
    store: Arc<dyn MeetingStore>,
    gateway: Arc<ModelGateway>,
    mut rx: mpsc::Receiver<Job>,
) {
    let mut order: VecDeque<JobKey> = VecDeque::new();
    let mut waiters: HashMap<JobKey, Vec<oneshot::Sender<Result<Persona, PersonaError>>>> =
        HashMap::new();

    fn enqueue(
        job: Job,
        order: &mut VecDeque<JobKey>,
        waiters: &mut HashMap<JobKey, Vec<oneshot::Sender<Result<Persona, PersonaError>>>>,
    ) {
        let key = (job.meeting_id, job.participant_id);
        match waiters.get_mut(&key) {
            Some(list) => list.push(job.reply),
            None => {
                waiters.insert(key.clone(), vec![job.reply]);
                order.push_back(key);
            }
        }
    }

    while let Some(job) = rx.recv().await {
        enqueue(job, &mut order, &mut waiters);
        loop {
            while let Ok(job) = rx.try_recv() {
                enqueue(job, &mut order, &mut waiters);
            }
            let Some(key) = order.pop_front() else { break };
            let list = waiters.remove(&key).unwrap_or_default();
            let (meeting_id, participant_id) = &key;
            let result = ensure_persona(store.as_ref(), gateway.as_ref(), meeting_id, participant_id)
                .await;
            match result {
                Ok(persona) => {
                    for reply in list {
                        let _ = reply.send(Ok(persona.clone()));
                    }
                }
                Err(err) => {
                    error!(meeting_id, participant_id, error = %err, "persona synthesis failed");
                    let message = err.to_string();
                    for reply in list {
                        let _ = reply.send(Err(PersonaError::Worker(message.clone())));
                    }
                }
            }
        }
    }
}
