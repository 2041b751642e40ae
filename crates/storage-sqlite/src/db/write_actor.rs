//! Single writer thread. Every job runs in its own immediate transaction, so a
//! job that fails leaves no partial writes behind.

use diesel::sqlite::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use survey_sync_core::errors::{Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type Acquired<'a> = std::result::Result<&'a mut SqliteConnection, StorageError>;
type Job = Box<dyn for<'a> FnOnce(Acquired<'a>) + Send>;

#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<Job>,
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
    std::thread::spawn(move || {
        while let Some(job) = receiver.blocking_recv() {
            match pool.get() {
                Ok(mut conn) => job(Ok(&mut *conn)),
                Err(e) => {
                    error!("Writer could not get a connection: {}", e);
                    job(Err(StorageError::from(e)));
                }
            }
        }
    });
    WriteHandle { sender }
}

enum TxError {
    Query(diesel::result::Error),
    Job(Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Query(err)
    }
}

fn in_transaction<T>(
    conn: &mut SqliteConnection,
    job: impl FnOnce(&mut SqliteConnection) -> Result<T>,
) -> Result<T> {
    conn.immediate_transaction(|tx| job(tx).map_err(TxError::Job))
        .map_err(|err| match err {
            TxError::Job(err) => err,
            TxError::Query(err) => StorageError::from(err).into(),
        })
}

impl WriteHandle {
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn: Acquired<'_>| {
            let result = conn
                .map_err(Error::from)
                .and_then(|conn| in_transaction(conn, job));
            let _ = reply.send(result);
        });
        self.sender
            .send(job)
            .map_err(|_| StorageError::WriterClosed)?;
        response.await.map_err(|_| StorageError::WriterClosed)?
    }
}
