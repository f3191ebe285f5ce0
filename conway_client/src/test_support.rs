// Test double for the backend seam: records outbound traffic, lets tests inject events.

use std::sync::Mutex;

use crate::backend::{
    Backend, ConnectParams, EventSink, Identity, LinkEvent, Query, QueryId, RemoteCall,
};
use crate::error::ClientError;

#[derive(Default)]
pub struct RecordingBackend {
    sink: Mutex<Option<EventSink>>,
    connects: Mutex<Vec<Option<String>>>,
    subscribes: Mutex<Vec<(QueryId, Vec<Query>)>>,
    unsubscribes: Mutex<Vec<QueryId>>,
    calls: Mutex<Vec<RemoteCall>>,
    // When set, the next call is refused with this error.
    call_error: Mutex<Option<ClientError>>,
}

impl RecordingBackend {
    pub fn push(&self, event: LinkEvent) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(event);
        }
    }

    pub fn accept(&self, identity: &str, token: &str) {
        self.push(LinkEvent::Connected {
            identity: Identity(identity.to_string()),
            token: token.to_string(),
        });
    }

    pub fn reject(&self, message: &str) {
        self.push(LinkEvent::ConnectError(message.to_string()));
    }

    pub fn drop_link(&self) {
        self.push(LinkEvent::Disconnected);
    }

    pub fn connects(&self) -> Vec<Option<String>> {
        self.connects.lock().unwrap().clone()
    }

    pub fn subscribes(&self) -> Vec<(QueryId, Vec<Query>)> {
        self.subscribes.lock().unwrap().clone()
    }

    pub fn last_query_id(&self) -> Option<QueryId> {
        self.subscribes.lock().unwrap().last().map(|(id, _)| *id)
    }

    pub fn unsubscribes(&self) -> Vec<QueryId> {
        self.unsubscribes.lock().unwrap().clone()
    }

    pub fn fail_calls(&self, err: ClientError) {
        *self.call_error.lock().unwrap() = Some(err);
    }

    pub fn accept_calls(&self) {
        *self.call_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Backend for RecordingBackend {
    fn connect(&self, params: ConnectParams, events: EventSink) {
        self.connects.lock().unwrap().push(params.token);
        *self.sink.lock().unwrap() = Some(events);
    }

    fn disconnect(&self) {
        self.drop_link();
    }

    fn subscribe(&self, id: QueryId, queries: &[Query]) -> Result<(), ClientError> {
        self.subscribes.lock().unwrap().push((id, queries.to_vec()));
        Ok(())
    }

    fn unsubscribe(&self, id: QueryId) -> Result<(), ClientError> {
        self.unsubscribes.lock().unwrap().push(id);
        Ok(())
    }

    fn call(&self, call: RemoteCall) -> Result<(), ClientError> {
        if let Some(err) = self.call_error.lock().unwrap().take() {
            return Err(err);
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}
