//! Fluent query pipelines.

use kindb_codec::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::collation::Collator;
use crate::error::{CoreError, CoreResult};
use crate::model::{Record, RecordKind};
use crate::selection::{Matcher, Predicate};
use crate::store::Store;

type Filter<'s> = Box<dyn Fn(&Record) -> bool + 's>;
type Proxy<'s> = Box<dyn Fn(Record) -> Option<Record> + 's>;

/// A lazy query over one record kind.
///
/// Builder calls return `&mut Self` so they chain with `?`. Once results
/// have been requested the pipeline is fixed and further builder calls
/// fail with `InvalidQueryOrder`.
///
/// ```rust
/// use kindb_core::{Config, Predicate, RecordKind, Store};
///
/// let store = Store::open_in_memory(Config::default()).unwrap();
/// let mut query = store.query(RecordKind::Person);
/// query
///     .where_(Predicate::like("primary_name.first_name", "A%"))
///     .unwrap()
///     .order("external_id", false)
///     .unwrap();
/// assert_eq!(query.count().unwrap(), 0);
/// assert!(query.limit(0, 5).is_err());
/// ```
pub struct QuerySet<'s> {
    store: &'s Store,
    kind: RecordKind,
    predicate: Option<Predicate>,
    proxies: Vec<Proxy<'s>>,
    filters: Vec<Filter<'s>>,
    order: Vec<(String, bool)>,
    start: usize,
    count: Option<usize>,
    started: bool,
}

impl<'s> QuerySet<'s> {
    pub(crate) fn new(store: &'s Store, kind: RecordKind) -> Self {
        Self {
            store,
            kind,
            predicate: None,
            proxies: Vec::new(),
            filters: Vec::new(),
            order: Vec::new(),
            start: 0,
            count: None,
            started: false,
        }
    }

    /// Kind being queried.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    fn building(&mut self, what: &str) -> CoreResult<&mut Self> {
        if self.started {
            return Err(CoreError::invalid_query_order(format!(
                "{what} after iteration started"
            )));
        }
        Ok(self)
    }

    /// Adds a predicate. Several calls are combined with `AND`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryOrder` once iteration has started.
    pub fn where_(&mut self, predicate: Predicate) -> CoreResult<&mut Self> {
        let this = self.building("where")?;
        this.predicate = Some(match this.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        Ok(this)
    }

    /// Passes every record through `f` before any predicate or filter
    /// sees it. Returning `None` hides the record; returning a changed
    /// record makes the rest of the pipeline see the change. Proxies run
    /// in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryOrder` once iteration has started.
    pub fn proxy<F>(&mut self, f: F) -> CoreResult<&mut Self>
    where
        F: Fn(Record) -> Option<Record> + 's,
    {
        let this = self.building("proxy")?;
        this.proxies.push(Box::new(f));
        Ok(this)
    }

    /// Adds an arbitrary record filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryOrder` once iteration has started.
    pub fn filter<F>(&mut self, f: F) -> CoreResult<&mut Self>
    where
        F: Fn(&Record) -> bool + 's,
    {
        let this = self.building("filter")?;
        this.filters.push(Box::new(f));
        Ok(this)
    }

    /// Adds a sort key. Earlier keys take precedence.
    ///
    /// Text values are compared with the store's collation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryOrder` once iteration has started.
    pub fn order(&mut self, field: impl Into<String>, descending: bool) -> CoreResult<&mut Self> {
        let this = self.building("order")?;
        this.order.push((field.into(), descending));
        Ok(this)
    }

    /// Skips `start` results and keeps at most `count`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQueryOrder` once iteration has started.
    pub fn limit(&mut self, start: usize, count: usize) -> CoreResult<&mut Self> {
        let this = self.building("limit")?;
        this.start = start;
        this.count = Some(count);
        Ok(this)
    }

    /// Runs the query and returns matching records.
    ///
    /// Without an order the records are produced lazily, in storage order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPredicate` if the predicate does not compile, or a
    /// storage or codec error from the store.
    pub fn iter(&mut self) -> CoreResult<Box<dyn Iterator<Item = CoreResult<Record>> + '_>> {
        self.started = true;
        let matcher = self.predicate.as_ref().map(Predicate::compile).transpose()?;
        let cursor = self.store.cursor(self.kind)?;
        let filters = &self.filters;
        let proxies = &self.proxies;
        let matched = cursor.filter_map(move |item| match item {
            Ok(record) => {
                let record = proxies.iter().try_fold(record, |record, proxy| proxy(record))?;
                match accept(&record, matcher.as_ref(), filters) {
                    Ok(true) => Some(Ok(record)),
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            Err(e) => Some(Err(e)),
        });

        let ordered: Box<dyn Iterator<Item = CoreResult<Record>> + '_> = if self.order.is_empty() {
            Box::new(matched)
        } else {
            let mut rows = Vec::new();
            for item in matched {
                let record = item?;
                let value = record.to_value()?;
                let keys: Vec<Value> = self
                    .order
                    .iter()
                    .map(|(field, _)| value.path(field).cloned().unwrap_or(Value::Null))
                    .collect();
                rows.push((keys, record));
            }
            let collator = self.store.collator();
            let order = &self.order;
            rows.sort_by(|(a, _), (b, _)| compare_keys(a, b, order, collator));
            Box::new(rows.into_iter().map(|(_, record)| Ok(record)))
        };

        let limited = ordered.skip(self.start);
        Ok(match self.count {
            Some(n) => Box::new(limited.take(n)),
            None => Box::new(limited),
        })
    }

    /// Collects all matching records.
    ///
    /// # Errors
    ///
    /// See [`Self::iter`].
    pub fn records(&mut self) -> CoreResult<Vec<Record>> {
        self.iter()?.collect()
    }

    /// Applies `f` to every matching record.
    ///
    /// # Errors
    ///
    /// See [`Self::iter`].
    pub fn map<T>(&mut self, mut f: impl FnMut(Record) -> T) -> CoreResult<Vec<T>> {
        self.iter()?.map(|item| item.map(&mut f)).collect()
    }

    /// Number of matching records, honouring the limit.
    ///
    /// # Errors
    ///
    /// See [`Self::iter`].
    pub fn count(&mut self) -> CoreResult<usize> {
        let mut n = 0;
        for item in self.iter()? {
            item?;
            n += 1;
        }
        Ok(n)
    }

    /// Projects the given field paths of every matching record.
    ///
    /// Missing fields project as null.
    ///
    /// # Errors
    ///
    /// See [`Self::iter`].
    pub fn select(&mut self, fields: &[&str]) -> CoreResult<Vec<Vec<Value>>> {
        self.iter()?
            .map(|item| {
                let value = item?.to_value()?;
                Ok(fields
                    .iter()
                    .map(|f| value.path(f).cloned().unwrap_or(Value::Null))
                    .collect())
            })
            .collect()
    }
}

fn accept(record: &Record, matcher: Option<&Matcher>, filters: &[Filter<'_>]) -> CoreResult<bool> {
    if let Some(m) = matcher {
        if !m.matches(&record.to_value()?) {
            return Ok(false);
        }
    }
    Ok(filters.iter().all(|f| f(record)))
}

fn compare_keys(a: &[Value], b: &[Value], order: &[(String, bool)], collator: &Collator) -> Ordering {
    for ((x, y), (_, descending)) in a.iter().zip(b).zip(order) {
        let ord = match (x, y) {
            (Value::Text(x), Value::Text(y)) => collator.compare(x, y),
            _ => x.cmp_total(y),
        };
        let ord = if *descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl fmt::Debug for QuerySet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("kind", &self.kind)
            .field("predicate", &self.predicate)
            .field("proxies", &self.proxies.len())
            .field("filters", &self.filters.len())
            .field("order", &self.order)
            .field("start", &self.start)
            .field("count", &self.count)
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::contract::WritableStore;
    use crate::model::{Gender, Person};

    fn store_with(people: &[(&str, &str, Gender)]) -> Store {
        let mut store = Store::open_in_memory(Config::default()).unwrap();
        store
            .with_transaction("Add", false, |s, txn| {
                for (given, surname, gender) in people {
                    s.add_person(&mut Person::new(*given, *surname, *gender), txn, true)?;
                }
                Ok(())
            })
            .unwrap();
        store
    }

    #[test]
    fn proxy_hides_records_before_predicates() {
        let store = store_with(&[
            ("Anna", "Berg", Gender::Female),
            ("Axel", "Berg", Gender::Male),
            ("Bo", "Dahl", Gender::Male),
        ]);
        let mut query = store.query(RecordKind::Person);
        query
            .proxy(|record| {
                let female = matches!(&record, Record::Person(p) if p.gender == Gender::Female);
                (!female).then_some(record)
            })
            .unwrap()
            .where_(Predicate::like("primary_name.first_name", "A%"))
            .unwrap();
        let ids: Vec<String> = query.map(|r| r.external_id().to_string()).unwrap();
        assert_eq!(ids, ["I0002"]);
    }

    #[test]
    fn predicates_see_the_proxied_record() {
        let store = store_with(&[("Anna", "Berg", Gender::Female)]);
        let mut query = store.query(RecordKind::Person);
        query
            .proxy(|record| match record {
                Record::Person(mut p) => {
                    p.primary_name.first_name = "Private".into();
                    Some(Record::Person(p))
                }
                other => Some(other),
            })
            .unwrap()
            .where_(Predicate::eq("primary_name.first_name", "Private"))
            .unwrap();
        assert_eq!(query.count().unwrap(), 1);
        assert!(query.proxy(Some).is_err());
    }
}
