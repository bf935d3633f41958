//! Pooled Postgres connections and an explicit transaction scope.
//!
//! Every store the services talk to implements [`Storage`], which only knows
//! how to open, commit and abandon a transaction. [`Transaction`] wraps a
//! store for the length of a unit of work: it must be committed explicitly,
//! and rolls back when dropped otherwise, so early returns and `?` never
//! leave a half-written unit behind.

use std::ops::{Deref, DerefMut};

use anyhow::{ensure, Context, Result};
use log::*;
use postgres::{Client, NoTls};
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;

pub trait Storage {
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn in_transaction(&self) -> bool;
}

pub struct Transaction<'a, S: Storage + ?Sized> {
    store: &'a mut S,
    finished: bool,
}

impl<'a, S: Storage + ?Sized> Transaction<'a, S> {
    pub fn begin(store: &'a mut S) -> Result<Self> {
        store.begin().context("begin transaction")?;
        trace!("Transaction opened");
        Ok(Transaction {
            store,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.store.commit().context("commit transaction")?;
        trace!("Transaction committed");
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.store.rollback().context("rollback transaction")?;
        trace!("Transaction rolled back");
        Ok(())
    }
}

impl<S: Storage + ?Sized> Deref for Transaction<'_, S> {
    type Target = S;
    fn deref(&self) -> &S {
        &*self.store
    }
}

impl<S: Storage + ?Sized> DerefMut for Transaction<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.store
    }
}

impl<S: Storage + ?Sized> Drop for Transaction<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        debug!("Abandoning open transaction");
        if let Err(e) = self.store.rollback() {
            warn!("Rollback of abandoned transaction failed: {:?}", e);
        }
    }
}

/// A pooled Postgres session.
pub struct Database {
    client: Client,
    in_transaction: bool,
}

impl Database {
    pub fn new(client: Client) -> Self {
        Database {
            client,
            in_transaction: false,
        }
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql)?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("Database")
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Storage for Database {
    fn begin(&mut self) -> Result<()> {
        ensure!(!self.in_transaction, "transaction already open");
        self.client.batch_execute("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        ensure!(self.in_transaction, "no transaction to commit");
        self.client.batch_execute("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        ensure!(self.in_transaction, "no transaction to roll back");
        // Left flagged on failure, so the pool discards the session.
        self.client.batch_execute("ROLLBACK")?;
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

#[derive(Debug)]
pub struct DatabaseConnectionManager {
    inner: PostgresConnectionManager<NoTls>,
}

impl DatabaseConnectionManager {
    pub fn new(url: &str) -> Result<Self> {
        let config: postgres::Config = url.parse().context("parse postgres url")?;
        let inner = PostgresConnectionManager::new(config, NoTls);
        Ok(DatabaseConnectionManager { inner })
    }
}

impl r2d2::ManageConnection for DatabaseConnectionManager {
    type Connection = Database;
    type Error = postgres::Error;

    fn connect(&self) -> Result<Database, postgres::Error> {
        self.inner.connect().map(Database::new)
    }

    fn is_valid(&self, conn: &mut Database) -> Result<(), postgres::Error> {
        self.inner.is_valid(&mut conn.client)
    }

    fn has_broken(&self, conn: &mut Database) -> bool {
        conn.in_transaction || self.inner.has_broken(&mut conn.client)
    }
}

pub fn pool(url: &str, max_size: u32) -> Result<Pool<DatabaseConnectionManager>> {
    let manager = DatabaseConnectionManager::new(url)?;
    let builder = r2d2::Pool::builder().max_size(max_size);
    debug!("Pool builder: {:?}", builder);
    let pool = builder.build(manager).context("build pool")?;
    Ok(pool)
}
