//! Integration tests for the subscribe / chat / clear lifecycle

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use relaybot_core::conversation::ConversationStore;
use relaybot_core::error::{ProviderError, RelayError};
use relaybot_core::provider::LlmProvider;
use relaybot_core::session::{CompletionSettings, SessionOrchestrator, UserLocks};
use relaybot_core::store::file_store::FileStore;
use relaybot_core::store::memory_store::MemoryStore;
use relaybot_core::store::{KvStore, StoreKey};
use relaybot_core::subscription::SubscriptionRegistry;
use relaybot_core::types::{CompletionResponse, FinishReason, Message, TokenUsage, UserId};

/// Answers `reply 1`, `reply 2`, ... and records what it was sent.
#[derive(Default)]
struct CountingProvider {
    count: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl CountingProvider {
    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for CountingProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _model: &str,
        _max_tokens: u32,
        _temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::Parse("missing choices".into()));
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CompletionResponse {
            content: format!("reply {n}"),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        })
    }

    fn default_model(&self) -> &str {
        "counting"
    }
}

struct Fixture {
    store: Arc<dyn KvStore>,
    subs: SubscriptionRegistry,
    conv: ConversationStore,
    provider: Arc<CountingProvider>,
    orch: SessionOrchestrator,
}

fn fixture_with(store: Arc<dyn KvStore>, provider: CountingProvider, locks: bool) -> Fixture {
    let provider = Arc::new(provider);
    let subs = SubscriptionRegistry::new(store.clone());
    let conv = ConversationStore::new(store.clone());
    let mut orch = SessionOrchestrator::new(
        subs.clone(),
        conv.clone(),
        provider.clone(),
        CompletionSettings {
            model: "counting".into(),
            max_tokens: 300,
            temperature: 0.9,
        },
    );
    if locks {
        orch = orch.with_user_locks(UserLocks::new());
    }
    Fixture {
        store,
        subs,
        conv,
        provider,
        orch,
    }
}

fn fixture() -> Fixture {
    fixture_with(Arc::new(MemoryStore::new()), CountingProvider::default(), false)
}

async fn transcript(f: &Fixture, user: UserId) -> Option<serde_json::Value> {
    f.store.get(&StoreKey::chats(user)).await.unwrap()
}

#[tokio::test]
async fn test_first_exchange_seeds_from_directive() {
    let f = fixture();
    let user = UserId(7);
    f.subs.subscribe(user).await.unwrap();
    f.conv.set_directive(user, "You are helpful").await.unwrap();

    let reply = f.orch.exchange(user, "Hello").await.unwrap();
    assert_eq!(reply.as_deref(), Some("reply 1"));
    assert_eq!(
        f.provider.calls()[0],
        vec![Message::system("You are helpful"), Message::user("Hello")]
    );
    assert_eq!(
        transcript(&f, user).await,
        Some(json!([
            {"role": "system", "content": "You are helpful"},
            {"role": "user", "content": "Hello"},
            {"role": "assistant", "content": "reply 1"},
        ]))
    );
}

#[tokio::test]
async fn test_transcript_grows_by_two_per_exchange() {
    let f = fixture();
    let user = UserId(1);
    f.subs.subscribe(user).await.unwrap();

    f.orch.exchange(user, "one").await.unwrap();
    f.orch.exchange(user, "two").await.unwrap();

    assert_eq!(
        f.provider.calls()[1],
        vec![
            Message::user("one"),
            Message::assistant("reply 1"),
            Message::user("two"),
        ]
    );
    assert_eq!(f.conv.load_seed(user).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unsubscribed_user_changes_nothing() {
    let f = fixture();
    let user = UserId(2);
    f.conv.set_directive(user, "ignored").await.unwrap();

    assert_eq!(f.orch.exchange(user, "Hello").await.unwrap(), None);
    assert!(f.provider.calls().is_empty());
    assert_eq!(transcript(&f, user).await, None);
}

#[tokio::test]
async fn test_failed_completion_keeps_previous_transcript() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let ok = fixture_with(store.clone(), CountingProvider::default(), false);
    let user = UserId(3);
    ok.subs.subscribe(user).await.unwrap();
    ok.orch.exchange(user, "first").await.unwrap();
    let before = transcript(&ok, user).await;

    let failing = fixture_with(store, CountingProvider::failing(), false);
    let err = failing.orch.exchange(user, "second").await.unwrap_err();
    assert!(matches!(err, RelayError::Provider(ProviderError::Parse(_))));
    assert_eq!(transcript(&failing, user).await, before);
}

#[tokio::test]
async fn test_clear_then_reseed_from_directive() {
    let f = fixture();
    let user = UserId(4);
    f.subs.subscribe(user).await.unwrap();
    f.orch.exchange(user, "before").await.unwrap();

    f.conv.set_directive(user, "Be brief").await.unwrap();
    f.conv.clear(user).await.unwrap();
    assert!(f.subs.is_subscribed(user).await.unwrap());

    f.orch.exchange(user, "after").await.unwrap();
    assert_eq!(
        f.provider.calls().last().unwrap(),
        &vec![Message::system("Be brief"), Message::user("after")]
    );
}

#[tokio::test]
async fn test_unsubscribe_forgets_everything() {
    let f = fixture();
    let user = UserId(5);
    f.subs.subscribe(user).await.unwrap();
    f.conv.set_directive(user, "Be brief").await.unwrap();
    f.orch.exchange(user, "hi").await.unwrap();

    f.subs.unsubscribe(user).await.unwrap();
    assert_eq!(f.store.get(&StoreKey::data(user)).await.unwrap(), None);
    assert_eq!(f.store.get(&StoreKey::chats(user)).await.unwrap(), None);
    assert_eq!(f.store.get(&StoreKey::prompt(user)).await.unwrap(), None);

    assert_eq!(f.orch.exchange(user, "still there?").await.unwrap(), None);
    assert_eq!(f.provider.calls().len(), 1);
}

#[tokio::test]
async fn test_users_do_not_share_state() {
    let f = fixture();
    let (alice, bob) = (UserId(10), UserId(11));
    f.subs.subscribe(alice).await.unwrap();
    f.subs.subscribe(bob).await.unwrap();
    f.conv.set_directive(alice, "Speak French").await.unwrap();

    f.orch.exchange(alice, "bonjour").await.unwrap();
    f.orch.exchange(bob, "hello").await.unwrap();

    assert_eq!(f.provider.calls()[1], vec![Message::user("hello")]);
    assert_eq!(f.conv.load_seed(bob).await.unwrap().len(), 2);
    assert_eq!(f.conv.load_seed(alice).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_interleaved_exchanges_last_write_wins() {
    let f = fixture();
    let user = UserId(6);
    f.subs.subscribe(user).await.unwrap();

    let a = f.orch.begin(user, "A").await.unwrap().unwrap();
    let b = f.orch.begin(user, "B").await.unwrap().unwrap();
    let reply_b = f.orch.complete(b).await.unwrap();
    let reply_a = f.orch.complete(a).await.unwrap();

    assert_eq!(reply_b, "reply 1");
    assert_eq!(reply_a, "reply 2");
    assert_eq!(
        f.conv.load_seed(user).await.unwrap(),
        vec![Message::user("A"), Message::assistant("reply 2")]
    );
}

#[tokio::test]
async fn test_interleaved_exchanges_in_begin_order() {
    let f = fixture();
    let user = UserId(7);
    f.subs.subscribe(user).await.unwrap();

    let a = f.orch.begin(user, "A").await.unwrap().unwrap();
    let b = f.orch.begin(user, "B").await.unwrap().unwrap();
    let reply_a = f.orch.complete(a).await.unwrap();
    let reply_b = f.orch.complete(b).await.unwrap();

    assert_eq!(reply_a, "reply 1");
    assert_eq!(reply_b, "reply 2");
    assert_eq!(
        f.conv.load_seed(user).await.unwrap(),
        vec![Message::user("B"), Message::assistant("reply 2")]
    );
}

#[tokio::test]
async fn test_serialized_exchanges_keep_both_turns() {
    let f = fixture_with(
        Arc::new(MemoryStore::new()),
        CountingProvider::slow(Duration::from_millis(20)),
        true,
    );
    let user = UserId(8);
    f.subs.subscribe(user).await.unwrap();

    let (first, second) = tokio::join!(
        f.orch.exchange(user, "first"),
        f.orch.exchange(user, "second"),
    );
    assert!(first.unwrap().is_some());
    assert!(second.unwrap().is_some());

    let turns = f.conv.load_seed(user).await.unwrap();
    assert_eq!(turns.len(), 4);
    let texts: Vec<&str> = turns.iter().map(|m| m.content.as_str()).collect();
    assert!(texts.contains(&"first"));
    assert!(texts.contains(&"second"));
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let tmp = tempfile::tempdir().unwrap();
    let user = UserId(12);
    {
        let store: Arc<dyn KvStore> = Arc::new(FileStore::open(tmp.path()).await.unwrap());
        let f = fixture_with(store.clone(), CountingProvider::default(), false);
        f.subs.subscribe(user).await.unwrap();
        f.orch.exchange(user, "remember me").await.unwrap();
        store.close().await.unwrap();
    }

    let store: Arc<dyn KvStore> = Arc::new(FileStore::open(tmp.path()).await.unwrap());
    let f = fixture_with(store, CountingProvider::default(), false);
    assert!(f.subs.is_subscribed(user).await.unwrap());
    assert_eq!(
        f.conv.load_seed(user).await.unwrap(),
        vec![Message::user("remember me"), Message::assistant("reply 1")]
    );
}
