//! Upload → ask scenarios through the public API with deterministic fakes.

use std::io::{Cursor, Write};
use std::sync::Arc;

use contextor::test_utils::{
    AnswerFailingChat, FailingIndex, HashEmbedder, QueryFailingEmbedder, ScriptedChat,
};
use contextor::{
    AnswerStage, ChatModel, ContextorConfig, ContextorError, Conversation, NO_CONTEXT_REPLY,
    RagAnswerer, Role, Session, SessionRegistry, Turn,
};
use futures::TryStreamExt;
use rag_store::{EmbeddingsProvider, IngestOutcome, RagConfig, RagStore};

const KIMCHI: &str =
    "Kimchi fried rice: rice, kimchi, sesame oil, soy sauce, sugar, scallion, egg.";

fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
    );
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

fn rag_config(dir: &std::path::Path) -> RagConfig {
    RagConfig::new_default(dir.join("index_db"), dir.join("uploaded_docs"))
}

async fn recipe_store(dir: &std::path::Path) -> Arc<RagStore> {
    let store = RagStore::open(rag_config(dir)).unwrap();
    let out = store
        .ingest_upload("kimchi.docx", &docx(&[KIMCHI]), &HashEmbedder)
        .await
        .unwrap();
    assert!(matches!(out, IngestOutcome::Indexed { chunks: 1, .. }));
    store
        .ingest_upload(
            "bulgogi.docx",
            &docx(&["Bulgogi: thinly sliced beef marinated with pear and garlic."]),
            &HashEmbedder,
        )
        .await
        .unwrap();
    Arc::new(store)
}

fn conversation(
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingsProvider>,
    store: Arc<RagStore>,
) -> Conversation {
    Conversation::new(Arc::new(RagAnswerer::new(
        chat,
        embedder,
        store,
        ContextorConfig::default(),
    )))
}

/// A session that already holds one earlier exchange.
fn session_with_history() -> Session {
    let mut s = Session::new();
    s.append_turn(Role::User, "What can I cook with leftover rice?");
    s.append_turn(Role::Assistant, "Kimchi fried rice, obviously.");
    s
}

#[tokio::test]
async fn kimchi_fried_rice_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let conv = conversation(Arc::new(ScriptedChat::default()), Arc::new(HashEmbedder), store);

    let mut session = Session::new();
    let qa = conv
        .ask(&mut session, "How do I make kimchi fried rice?")
        .await
        .unwrap();

    assert!(qa.used_chunks.iter().any(|c| c.text == KIMCHI));
    assert_eq!(qa.used_chunks[0].source.as_deref(), Some("kimchi.docx"));
    let answer = qa.answer.to_lowercase();
    for word in ["rice", "kimchi", "egg"] {
        assert!(answer.contains(word), "answer misses {word}: {answer}");
    }
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn empty_index_answers_dont_know() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RagStore::open(rag_config(dir.path())).unwrap());
    let chat = Arc::new(ScriptedChat::default());
    let conv = conversation(chat.clone(), Arc::new(HashEmbedder), store);

    let mut session = Session::new();
    let qa = conv.ask(&mut session, "How do I make japchae?").await.unwrap();
    assert_eq!(qa.answer, NO_CONTEXT_REPLY);
    assert!(qa.used_chunks.is_empty());
    assert_eq!(chat.calls(), 0);
}

#[tokio::test]
async fn follow_up_is_answered_from_the_rewritten_question() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let chat = Arc::new(ScriptedChat::new(["What goes on top of kimchi fried rice?"]));
    let conv = conversation(chat.clone(), Arc::new(HashEmbedder), store);

    let mut session = session_with_history();
    let qa = conv.ask(&mut session, "What goes on top?").await.unwrap();

    assert_eq!(qa.standalone_question, "What goes on top of kimchi fried rice?");
    assert_eq!(qa.used_chunks[0].text, KIMCHI);
    // rewrite + answer
    assert_eq!(chat.calls(), 2);
    let sent = chat.last_messages();
    assert_eq!(sent.last().unwrap().content, qa.standalone_question);
    assert_eq!(session.history().len(), 4);
}

async fn assert_failure_keeps_history(conv: Conversation, stage: AnswerStage) {
    let mut session = session_with_history();
    let before: Vec<Turn> = session.history().to_vec();

    let err = conv
        .ask(&mut session, "How long do I fry the kimchi rice?")
        .await
        .unwrap_err();
    match &err {
        ContextorError::AnswerGeneration { stage: got, .. } => assert_eq!(*got, stage),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.user_message().is_empty());

    let after = session.history();
    assert_eq!(&after[..before.len()], before.as_slice());
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[before.len()].role, Role::User);
}

#[tokio::test]
async fn embed_failure_surfaces_and_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let conv = conversation(
        Arc::new(ScriptedChat::default()),
        Arc::new(QueryFailingEmbedder),
        store,
    );
    assert_failure_keeps_history(conv, AnswerStage::Embed).await;
}

#[tokio::test]
async fn search_failure_surfaces_and_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(RagStore::with_index(rag_config(dir.path()), Arc::new(FailingIndex)).unwrap());
    let conv = conversation(Arc::new(ScriptedChat::default()), Arc::new(HashEmbedder), store);
    assert_failure_keeps_history(conv, AnswerStage::Search).await;
}

#[tokio::test]
async fn completion_failure_surfaces_and_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let chat = Arc::new(AnswerFailingChat {
        first: String::new(),
    });
    let conv = conversation(chat, Arc::new(HashEmbedder), store);
    assert_failure_keeps_history(conv, AnswerStage::Complete).await;
}

#[tokio::test]
async fn streamed_turn_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let conv = conversation(
        Arc::new(ScriptedChat::new(["Fry the kimchi, add the rice, crack an egg on top."])),
        Arc::new(HashEmbedder),
        store,
    );
    let registry = SessionRegistry::new();
    let handle = registry.get(registry.create().await).await.unwrap();

    let turn = conv
        .ask_stream(handle.clone(), "How do I make kimchi fried rice?")
        .await
        .unwrap();
    assert!(turn.used_chunks.iter().any(|c| c.text == KIMCHI));
    let parts: Vec<String> = turn.try_collect().await.unwrap();
    assert!(parts.len() > 1);

    let session = handle.lock().await;
    assert_eq!(session.history()[1].text, parts.concat());
}

#[tokio::test]
async fn reingesting_the_same_file_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let store = recipe_store(dir.path()).await;
    let before = store.len().await.unwrap();
    let again = store
        .ingest_upload("kimchi.docx", &docx(&[KIMCHI]), &HashEmbedder)
        .await
        .unwrap();
    assert_eq!(
        again,
        IngestOutcome::AlreadyIndexed {
            source: "kimchi.docx".into()
        }
    );
    assert_eq!(store.len().await.unwrap(), before);
}
