use std::collections::{BTreeSet, HashMap};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, Put, TransactWriteItem};
use chrono::NaiveDateTime;
use serde::Serialize;
use crate::circulation::repository::{CirculationStore, Mutation, UnitOfWork};
use crate::core::library::{bounded_page_size, LibraryError, LibraryResult, LoanStatus, PaginatedResult, ReservationStatus};
use crate::inventory::domain::model::InventoryCounterEntity;
use crate::items::domain::model::ItemEntity;
use crate::loans::domain::model::LoanEntity;
use crate::reservations::domain::model::ReservationEntity;
use crate::utils::ddb::{add_filter_expr, create_table, from_ddb, parse_bool_attribute, parse_date_attribute, parse_item, parse_number_attribute, parse_string_attribute, string_date, to_ddb_page};

pub(crate) const ITEMS_TABLE: &str = "circulation_items";
pub(crate) const LOANS_TABLE: &str = "loans";
pub(crate) const RESERVATIONS_TABLE: &str = "reservations";
pub(crate) const INVENTORY_TABLE: &str = "inventory";

// DDBCirculationStore commits a unit of work as one TransactWriteItems call. Every
// put is conditioned on the version read by the caller (or on absence for inserts),
// and every loan or reservation write must travel with a write of its item row, so
// the item's open-loan and reservation slots act as the uniqueness constraint.
#[derive(Debug)]
pub(crate) struct DDBCirculationStore {
    client: Client,
}

impl DDBCirculationStore {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
        }
    }

    async fn get_row(&self, table_name: &str, pk: &str, id: &str) -> LibraryResult<HashMap<String, AttributeValue>> {
        self.client
            .get_item()
            .table_name(table_name)
            .key(pk, AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .send()
            .await.map_err(LibraryError::from).and_then(|res| {
            res.item.ok_or_else(|| LibraryError::not_found(format!("{} not found for {}", table_name, id).as_str()))
        })
    }

    async fn query_by_status(&self, item_id: &str, status: ReservationStatus) -> LibraryResult<Vec<String>> {
        let mut ids = vec![];
        let mut start_key = None;
        loop {
            let res = self.client
                .query()
                .table_name(RESERVATIONS_TABLE)
                .index_name(format!("{}_ndx", RESERVATIONS_TABLE))
                .consistent_read(false)
                .key_condition_expression("item_id = :item_id AND reservation_status = :reservation_status")
                .expression_attribute_values(":item_id", AttributeValue::S(item_id.to_string()))
                .expression_attribute_values(":reservation_status", AttributeValue::S(status.to_string()))
                .set_exclusive_start_key(start_key)
                .send()
                .await?;
            for map in res.items().unwrap_or_default() {
                if let Some(id) = parse_string_attribute("reservation_id", map) {
                    ids.push(id);
                }
            }
            start_key = res.last_evaluated_key().cloned();
            if start_key.is_none() {
                return Ok(ids);
            }
        }
    }

    async fn scan_page(&self, table_name: &str, predicate: &HashMap<String, String>,
                       page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<HashMap<String, AttributeValue>>> {
        let mut request = self.client
            .scan()
            .table_name(table_name)
            .consistent_read(false)
            .set_exclusive_start_key(to_ddb_page(page, &HashMap::new()))
            .limit(bounded_page_size(page_size) as i32);
        let mut filter_expr = String::new();
        for (k, v) in predicate {
            let ks = add_filter_expr(k.as_str(), &mut filter_expr);
            request = request.expression_attribute_values(format!(":{}", ks).as_str(), AttributeValue::S(v.to_string()));
        }
        if !filter_expr.is_empty() {
            request = request.filter_expression(filter_expr);
        }
        request
            .send()
            .await.map_err(LibraryError::from).map(|res| {
            let records = res.items().unwrap_or_default().to_vec();
            from_ddb(page, page_size, res.last_evaluated_key(), records)
        })
    }
}

fn put<T: Serialize>(table_name: &str, pk: &str, entity: &T, expected_version: Option<i64>) -> LibraryResult<TransactWriteItem> {
    let val = serde_json::to_value(entity)?;
    let builder = Put::builder()
        .table_name(table_name)
        .set_item(Some(parse_item(val)?));
    let builder = match expected_version {
        None => builder.condition_expression(format!("attribute_not_exists({})", pk)),
        Some(version) => builder
            .condition_expression("version = :expected_version")
            .expression_attribute_values(":expected_version", AttributeValue::N(version.to_string())),
    };
    Ok(TransactWriteItem::builder().put(builder.build()).build())
}

// loan and reservation writes are only safe together with a conditional write of their item row
fn check_item_guarded(mutations: &[Mutation]) -> LibraryResult<()> {
    let guarded: BTreeSet<&str> = mutations.iter()
        .filter(|m| matches!(m, Mutation::Item(_)))
        .map(Mutation::item_id).collect();
    for mutation in mutations {
        if matches!(mutation, Mutation::Loan(_) | Mutation::Reservation(_)) && !guarded.contains(mutation.item_id()) {
            return Err(LibraryError::validation(
                format!("write for item {} does not include the item row", mutation.item_id()).as_str(), None));
        }
    }
    Ok(())
}

// Maps cancellation reasons back to the mutation that failed its condition.
fn commit_error(err: SdkError<TransactWriteItemsError>, mutations: &[Mutation]) -> LibraryError {
    if let Some(TransactWriteItemsError::TransactionCanceledException(canceled)) = match &err { SdkError::ServiceError(se) => Some(se.err()), _ => None } {
        for (i, reason) in canceled.cancellation_reasons().unwrap_or_default().iter().enumerate() {
            match reason.code() {
                Some("ConditionalCheckFailed") => {
                    let inserted = mutations.get(i).map_or(false, Mutation::is_insert);
                    let message = format!("conditional write {} failed for item {}", i,
                                          mutations.get(i).map_or("", Mutation::item_id));
                    return if inserted {
                        LibraryError::duplicate_key(message.as_str())
                    } else {
                        LibraryError::concurrency_conflict(message.as_str())
                    };
                }
                Some("TransactionConflict") => {
                    return LibraryError::concurrency_conflict(
                        format!("transaction conflict on write {}", i).as_str());
                }
                _ => {}
            }
        }
    }
    LibraryError::from(err)
}

#[async_trait]
impl CirculationStore for DDBCirculationStore {
    async fn get_item(&self, item_id: &str) -> LibraryResult<ItemEntity> {
        self.get_row(ITEMS_TABLE, "item_id", item_id).await.map(|map| ItemEntity::from(&map))
    }

    async fn get_loan(&self, loan_id: &str) -> LibraryResult<LoanEntity> {
        self.get_row(LOANS_TABLE, "loan_id", loan_id).await.map(|map| LoanEntity::from(&map))
    }

    async fn get_reservation(&self, reservation_id: &str) -> LibraryResult<ReservationEntity> {
        self.get_row(RESERVATIONS_TABLE, "reservation_id", reservation_id).await.map(|map| ReservationEntity::from(&map))
    }

    async fn get_counter(&self, counter_id: &str) -> LibraryResult<InventoryCounterEntity> {
        self.get_row(INVENTORY_TABLE, "counter_id", counter_id).await.map(|map| InventoryCounterEntity::from(&map))
    }

    // The index is eventually consistent, so the ids it returns are merged with the
    // item's own slots and every candidate is re-read with a consistent get.
    async fn find_pending_reservations(&self, item_id: &str) -> LibraryResult<Vec<ReservationEntity>> {
        let mut ids = BTreeSet::new();
        ids.extend(self.query_by_status(item_id, ReservationStatus::Reserved).await?);
        ids.extend(self.query_by_status(item_id, ReservationStatus::Wait).await?);
        match self.get_item(item_id).await {
            Ok(item) => {
                ids.extend(item.active_reservation_id);
                ids.extend(item.held_for);
            }
            Err(LibraryError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        let mut pending = vec![];
        for id in ids {
            let reservation = self.get_reservation(id.as_str()).await?;
            if reservation.reservation_status.holds_slot() {
                pending.push(reservation);
            }
        }
        pending.sort_by(|a, b| a.reservation_at.cmp(&b.reservation_at).then(a.sequence.cmp(&b.sequence)));
        Ok(pending)
    }

    async fn find_expiring_reservations(&self, now: NaiveDateTime) -> LibraryResult<Vec<ReservationEntity>> {
        let mut expiring = vec![];
        let mut start_key = None;
        loop {
            let res = self.client
                .scan()
                .table_name(RESERVATIONS_TABLE)
                .consistent_read(true)
                .filter_expression("reservation_status IN (:reserved, :wait) AND expires_at <= :now")
                .expression_attribute_values(":reserved", AttributeValue::S(ReservationStatus::Reserved.to_string()))
                .expression_attribute_values(":wait", AttributeValue::S(ReservationStatus::Wait.to_string()))
                .expression_attribute_values(":now", string_date(now))
                .set_exclusive_start_key(start_key)
                .send()
                .await?;
            expiring.extend(res.items().unwrap_or_default().iter().map(ReservationEntity::from));
            start_key = res.last_evaluated_key().cloned();
            if start_key.is_none() {
                break;
            }
        }
        expiring.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        Ok(expiring)
    }

    // Note you cannot use certain reserved words per https://docs.aws.amazon.com/amazondynamodb/latest/developerguide/ReservedWords.html
    async fn query_loans(&self, predicate: &HashMap<String, String>,
                         page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<LoanEntity>> {
        let res = self.scan_page(LOANS_TABLE, predicate, page, page_size).await?;
        let records = res.records.iter().map(LoanEntity::from).collect();
        Ok(PaginatedResult::new(page, page_size, res.next_page, records))
    }

    async fn query_reservations(&self, predicate: &HashMap<String, String>,
                                page: Option<&str>, page_size: usize) -> LibraryResult<PaginatedResult<ReservationEntity>> {
        let res = self.scan_page(RESERVATIONS_TABLE, predicate, page, page_size).await?;
        let records = res.records.iter().map(ReservationEntity::from).collect();
        Ok(PaginatedResult::new(page, page_size, res.next_page, records))
    }

    async fn commit(&self, uow: UnitOfWork) -> LibraryResult<usize> {
        let mutations = uow.into_mutations();
        if mutations.is_empty() {
            return Ok(0);
        }
        check_item_guarded(&mutations)?;
        let mut items = vec![];
        for mutation in &mutations {
            items.push(match mutation {
                Mutation::Item(w) => put(ITEMS_TABLE, "item_id", &w.entity, w.expected_version)?,
                Mutation::Loan(w) => put(LOANS_TABLE, "loan_id", &w.entity, w.expected_version)?,
                Mutation::Reservation(w) => put(RESERVATIONS_TABLE, "reservation_id", &w.entity, w.expected_version)?,
                Mutation::Counter(w) => put(INVENTORY_TABLE, "counter_id", &w.entity, w.expected_version)?,
            });
        }
        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map(|_| mutations.len())
            .map_err(|err| commit_error(err, &mutations))
    }
}

pub(crate) async fn create_circulation_tables(client: &Client) -> LibraryResult<()> {
    // every table is attempted even when an earlier one already exists
    let results = [
        create_table(client, ITEMS_TABLE, "item_id", None).await,
        create_table(client, LOANS_TABLE, "loan_id", Some(("item_id", "loan_status"))).await,
        create_table(client, RESERVATIONS_TABLE, "reservation_id", Some(("item_id", "reservation_status"))).await,
        create_table(client, INVENTORY_TABLE, "counter_id", None).await,
    ];
    results.into_iter().collect::<LibraryResult<Vec<()>>>().map(|_| ())
}

fn parse_required(name: &str, map: &HashMap<String, AttributeValue>) -> String {
    parse_string_attribute(name, map).unwrap_or_default()
}

impl From<&HashMap<String, AttributeValue>> for ItemEntity {
    fn from(map: &HashMap<String, AttributeValue>) -> Self {
        ItemEntity {
            item_id: parse_required("item_id", map),
            version: parse_number_attribute("version", map),
            title: parse_required("title", map),
            borrowable: parse_bool_attribute("borrowable", map),
            open_loan_id: parse_string_attribute("open_loan_id", map),
            active_reservation_id: parse_string_attribute("active_reservation_id", map),
            held_for: parse_string_attribute("held_for", map),
            reservation_seq: parse_number_attribute("reservation_seq", map),
            created_at: parse_date_attribute("created_at", map).unwrap_or_default(),
            updated_at: parse_date_attribute("updated_at", map).unwrap_or_default(),
        }
    }
}

impl From<&HashMap<String, AttributeValue>> for LoanEntity {
    fn from(map: &HashMap<String, AttributeValue>) -> Self {
        LoanEntity {
            loan_id: parse_required("loan_id", map),
            version: parse_number_attribute("version", map),
            branch_id: parse_required("branch_id", map),
            item_id: parse_required("item_id", map),
            borrower_id: parse_required("borrower_id", map),
            reservation_id: parse_string_attribute("reservation_id", map),
            loan_status: LoanStatus::from(parse_string_attribute("loan_status", map).unwrap_or_else(|| LoanStatus::Borrowed.to_string())),
            borrowed_at: parse_date_attribute("borrowed_at", map).unwrap_or_default(),
            due_at: parse_date_attribute("due_at", map).unwrap_or_default(),
            returned_at: parse_date_attribute("returned_at", map),
            overdue_days: parse_number_attribute("overdue_days", map),
            created_at: parse_date_attribute("created_at", map).unwrap_or_default(),
            updated_at: parse_date_attribute("updated_at", map).unwrap_or_default(),
        }
    }
}

impl From<&HashMap<String, AttributeValue>> for ReservationEntity {
    fn from(map: &HashMap<String, AttributeValue>) -> Self {
        ReservationEntity {
            reservation_id: parse_required("reservation_id", map),
            version: parse_number_attribute("version", map),
            branch_id: parse_required("branch_id", map),
            item_id: parse_required("item_id", map),
            borrower_id: parse_required("borrower_id", map),
            sequence: parse_number_attribute("sequence", map),
            reservation_status: ReservationStatus::from(parse_string_attribute("reservation_status", map)
                .unwrap_or_else(|| ReservationStatus::Reserved.to_string())),
            reservation_at: parse_date_attribute("reservation_at", map).unwrap_or_default(),
            ready_at: parse_date_attribute("ready_at", map),
            expires_at: parse_date_attribute("expires_at", map),
            cancelled_at: parse_date_attribute("cancelled_at", map),
            completed_at: parse_date_attribute("completed_at", map),
            loan_id: parse_string_attribute("loan_id", map),
            created_at: parse_date_attribute("created_at", map).unwrap_or_default(),
            updated_at: parse_date_attribute("updated_at", map).unwrap_or_default(),
        }
    }
}

impl From<&HashMap<String, AttributeValue>> for InventoryCounterEntity {
    fn from(map: &HashMap<String, AttributeValue>) -> Self {
        InventoryCounterEntity {
            counter_id: parse_required("counter_id", map),
            version: parse_number_attribute("version", map),
            item_id: parse_required("item_id", map),
            location_id: parse_required("location_id", map),
            on_hand: parse_number_attribute("on_hand", map),
            reserved: parse_number_attribute("reserved", map),
            created_at: parse_date_attribute("created_at", map).unwrap_or_default(),
            updated_at: parse_date_attribute("updated_at", map).unwrap_or_default(),
        }
    }
}
