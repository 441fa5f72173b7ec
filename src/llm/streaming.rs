use crate::error::LlmError;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// Incremental text, in arrival order.
    Delta(String),
    /// Successful end; carries the whole response text.
    Done(String),
    Error(LlmError),
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }
}

type EventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'static>>;

/// Events of one chat call.
///
/// Yields any number of `Delta`s followed by exactly one terminal `Done` or
/// `Error`, then ends. If the underlying transport stops without a terminal
/// event, the stream supplies `Done` with the text accumulated so far.
/// Dropping the stream cancels the call.
pub struct ChatStream {
    inner: EventStream,
    accumulated: String,
    finished: bool,
}

impl ChatStream {
    pub fn new(inner: impl Stream<Item = ChatEvent> + Send + 'static) -> Self {
        Self {
            inner: Box::pin(inner),
            accumulated: String::new(),
            finished: false,
        }
    }

    /// A stream whose only event is `error`.
    pub fn failed(error: LlmError) -> Self {
        Self::new(futures_util::stream::once(async move {
            ChatEvent::Error(error)
        }))
    }

    /// Drive the stream to its terminal event.
    pub async fn collect_text(mut self) -> Result<String, LlmError> {
        while let Some(event) = self.next().await {
            match event {
                ChatEvent::Delta(_) => {}
                ChatEvent::Done(text) => return Ok(text),
                ChatEvent::Error(error) => return Err(error),
            }
        }
        Ok(std::mem::take(&mut self.accumulated))
    }
}

impl Stream for ChatStream {
    type Item = ChatEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(event)) => {
                match &event {
                    ChatEvent::Delta(text) => this.accumulated.push_str(text),
                    ChatEvent::Done(_) | ChatEvent::Error(_) => this.finished = true,
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(Some(ChatEvent::Done(std::mem::take(&mut this.accumulated))))
            }
        }
    }
}
