#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use crm_security::{CallContext, TenantId};
    use customers_sdk::{
        Customer, CustomerFilter, CustomerNote, CustomerSearch, CustomerType, CustomerUpdate,
        NewCustomer, NewCustomerNote, NewVehicle, NoteFilter, NoteType, Page, PropertyValue,
        Vehicle, VehicleFilter, VehicleUpdate,
    };
    use error::DomainError;
    use repo::{CustomerRepository, NoteRepository, RepoResult, VehicleRepository};
    use service::{CustomerService, VehicleService};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    // In-memory store backing all three repositories, for a single tenant.
    #[derive(Default)]
    struct State {
        next_id: i64,
        customers: Vec<Customer>,
        vehicles: Vec<Vehicle>,
        notes: Vec<CustomerNote>,
    }

    impl State {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    #[derive(Default)]
    struct MemStore {
        state: Mutex<State>,
    }

    impl MemStore {
        fn with<T>(&self, ctx: &CallContext, f: impl FnOnce(&mut State) -> T) -> RepoResult<T> {
            ctx.require_tenant()?;
            let mut state = self.state.lock().unwrap();
            Ok(f(&mut state))
        }
    }

    fn page_of<T>(items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        Page {
            items,
            total,
            page: 1,
            limit: 50,
        }
    }

    #[async_trait]
    impl CustomerRepository for MemStore {
        async fn create(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer> {
            self.with(ctx, |s| {
                let mut c = customer.clone();
                c.id = s.next_id();
                s.customers.push(c.clone());
                c
            })
        }

        async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Customer> {
            self.with(ctx, |s| s.customers.iter().find(|c| c.id == id).cloned())?
                .ok_or_else(|| DomainError::not_found("customer", id))
        }

        async fn update(&self, ctx: &CallContext, customer: &Customer) -> RepoResult<Customer> {
            self.with(ctx, |s| {
                s.customers.iter_mut().find(|c| c.id == customer.id).map(|c| {
                    *c = customer.clone();
                    c.clone()
                })
            })?
            .ok_or_else(|| DomainError::not_found("customer", customer.id))
        }

        async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
            self.with(ctx, |s| s.customers.retain(|c| c.id != id))
        }

        async fn list(
            &self,
            ctx: &CallContext,
            filter: &CustomerFilter,
        ) -> RepoResult<Page<Customer>> {
            self.with(ctx, |s| {
                page_of(
                    s.customers
                        .iter()
                        .filter(|c| !filter.active_only || c.is_active)
                        .cloned()
                        .collect(),
                )
            })
        }

        async fn search(
            &self,
            ctx: &CallContext,
            search: &CustomerSearch,
        ) -> RepoResult<Vec<Customer>> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .filter(|c| c.is_active && c.first_name.contains(&search.query))
                    .cloned()
                    .collect()
            })
        }

        async fn get_by_email(&self, ctx: &CallContext, email: &str) -> RepoResult<Customer> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .find(|c| c.email.as_deref() == Some(email))
                    .cloned()
            })?
            .ok_or_else(|| DomainError::not_found("customer", email))
        }

        async fn get_by_tax_id(&self, ctx: &CallContext, tax_id: &str) -> RepoResult<Customer> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .find(|c| c.tax_id.as_deref() == Some(tax_id))
                    .cloned()
            })?
            .ok_or_else(|| DomainError::not_found("customer", tax_id))
        }

        async fn list_by_type(
            &self,
            ctx: &CallContext,
            customer_type: CustomerType,
            _page: u32,
            _limit: u32,
        ) -> RepoResult<Page<Customer>> {
            self.with(ctx, |s| {
                page_of(
                    s.customers
                        .iter()
                        .filter(|c| c.customer_type == customer_type)
                        .cloned()
                        .collect(),
                )
            })
        }

        async fn list_inactive(
            &self,
            ctx: &CallContext,
            _page: u32,
            _limit: u32,
        ) -> RepoResult<Page<Customer>> {
            self.with(ctx, |s| {
                page_of(s.customers.iter().filter(|c| !c.is_active).cloned().collect())
            })
        }

        async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
            self.with(ctx, |s| s.customers.len() as u64)
        }

        async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64> {
            self.with(ctx, |s| s.customers.iter().filter(|c| c.is_active).count() as u64)
        }

        async fn count_by_type(
            &self,
            ctx: &CallContext,
            customer_type: CustomerType,
        ) -> RepoResult<u64> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .filter(|c| c.customer_type == customer_type)
                    .count() as u64
            })
        }

        async fn exists_by_email(
            &self,
            ctx: &CallContext,
            email: &str,
            exclude_id: Option<i64>,
        ) -> RepoResult<bool> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .any(|c| c.email.as_deref() == Some(email) && Some(c.id) != exclude_id)
            })
        }

        async fn exists_by_tax_id(
            &self,
            ctx: &CallContext,
            tax_id: &str,
            exclude_id: Option<i64>,
        ) -> RepoResult<bool> {
            self.with(ctx, |s| {
                s.customers
                    .iter()
                    .any(|c| c.tax_id.as_deref() == Some(tax_id) && Some(c.id) != exclude_id)
            })
        }
    }

    #[async_trait]
    impl VehicleRepository for MemStore {
        async fn create(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle> {
            self.with(ctx, |s| {
                let mut v = vehicle.clone();
                v.id = s.next_id();
                s.vehicles.push(v.clone());
                v
            })
        }

        async fn create_batch(
            &self,
            ctx: &CallContext,
            vehicles: &[Vehicle],
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                vehicles
                    .iter()
                    .map(|vehicle| {
                        let mut v = vehicle.clone();
                        v.id = s.next_id();
                        s.vehicles.push(v.clone());
                        v
                    })
                    .collect()
            })
        }

        async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<Vehicle> {
            self.with(ctx, |s| s.vehicles.iter().find(|v| v.id == id).cloned())?
                .ok_or_else(|| DomainError::not_found("vehicle", id))
        }

        async fn update(&self, ctx: &CallContext, vehicle: &Vehicle) -> RepoResult<Vehicle> {
            self.with(ctx, |s| {
                s.vehicles.iter_mut().find(|v| v.id == vehicle.id).map(|v| {
                    *v = vehicle.clone();
                    v.clone()
                })
            })?
            .ok_or_else(|| DomainError::not_found("vehicle", vehicle.id))
        }

        async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
            self.with(ctx, |s| s.vehicles.retain(|v| v.id != id))
        }

        async fn list(&self, ctx: &CallContext, filter: &VehicleFilter) -> RepoResult<Page<Vehicle>> {
            self.with(ctx, |s| {
                page_of(
                    s.vehicles
                        .iter()
                        .filter(|v| filter.customer_id.is_none_or(|id| v.customer_id == id))
                        .cloned()
                        .collect(),
                )
            })
        }

        async fn list_by_customer(
            &self,
            ctx: &CallContext,
            customer_id: i64,
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| v.customer_id == customer_id)
                    .cloned()
                    .collect()
            })
        }

        async fn list_active_by_customer(
            &self,
            ctx: &CallContext,
            customer_id: i64,
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| v.customer_id == customer_id && v.is_active)
                    .cloned()
                    .collect()
            })
        }

        async fn get_by_vin(&self, ctx: &CallContext, vin: &str) -> RepoResult<Vehicle> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .find(|v| v.vin.as_deref() == Some(vin))
                    .cloned()
            })?
            .ok_or_else(|| DomainError::not_found("vehicle", vin))
        }

        async fn get_by_license_plate(&self, ctx: &CallContext, plate: &str) -> RepoResult<Vehicle> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .find(|v| v.license_plate.as_deref() == Some(plate))
                    .cloned()
            })?
            .ok_or_else(|| DomainError::not_found("vehicle", plate))
        }

        async fn search_by_make_model(
            &self,
            ctx: &CallContext,
            make: &str,
            model: &str,
            year: Option<i32>,
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| {
                        v.make == make && v.model == model && year.is_none_or(|y| v.year == y)
                    })
                    .cloned()
                    .collect()
            })
        }

        async fn find_compatible(
            &self,
            ctx: &CallContext,
            make: &str,
            model: &str,
            year_from: i32,
            year_to: i32,
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| {
                        v.is_active
                            && v.make == make
                            && v.model == model
                            && (year_from..=year_to).contains(&v.year)
                    })
                    .cloned()
                    .collect()
            })
        }

        async fn list_by_make_model_year(
            &self,
            ctx: &CallContext,
            make: &str,
            model: &str,
            year: i32,
        ) -> RepoResult<Vec<Vehicle>> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| v.make == make && v.model == model && v.year == year)
                    .cloned()
                    .collect()
            })
        }

        async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
            self.with(ctx, |s| s.vehicles.len() as u64)
        }

        async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .filter(|v| v.customer_id == customer_id)
                    .count() as u64
            })
        }

        async fn count_active(&self, ctx: &CallContext) -> RepoResult<u64> {
            self.with(ctx, |s| s.vehicles.iter().filter(|v| v.is_active).count() as u64)
        }

        async fn exists_by_vin(
            &self,
            ctx: &CallContext,
            vin: &str,
            exclude_id: Option<i64>,
        ) -> RepoResult<bool> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .any(|v| v.vin.as_deref() == Some(vin) && Some(v.id) != exclude_id)
            })
        }

        async fn exists_by_license_plate(
            &self,
            ctx: &CallContext,
            plate: &str,
            exclude_id: Option<i64>,
        ) -> RepoResult<bool> {
            self.with(ctx, |s| {
                s.vehicles
                    .iter()
                    .any(|v| v.license_plate.as_deref() == Some(plate) && Some(v.id) != exclude_id)
            })
        }
    }

    #[async_trait]
    impl NoteRepository for MemStore {
        async fn create(&self, ctx: &CallContext, note: &CustomerNote) -> RepoResult<CustomerNote> {
            self.with(ctx, |s| {
                let mut n = note.clone();
                n.id = s.next_id();
                s.notes.push(n.clone());
                n
            })
        }

        async fn get(&self, ctx: &CallContext, id: i64) -> RepoResult<CustomerNote> {
            self.with(ctx, |s| s.notes.iter().find(|n| n.id == id).cloned())?
                .ok_or_else(|| DomainError::not_found("note", id))
        }

        async fn delete(&self, ctx: &CallContext, id: i64) -> RepoResult<()> {
            self.with(ctx, |s| s.notes.retain(|n| n.id != id))
        }

        async fn list(
            &self,
            ctx: &CallContext,
            filter: &NoteFilter,
        ) -> RepoResult<Page<CustomerNote>> {
            self.with(ctx, |s| {
                page_of(
                    s.notes
                        .iter()
                        .filter(|n| filter.customer_id.is_none_or(|id| n.customer_id == id))
                        .cloned()
                        .collect(),
                )
            })
        }

        async fn list_by_customer(
            &self,
            ctx: &CallContext,
            customer_id: i64,
        ) -> RepoResult<Vec<CustomerNote>> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .rev()
                    .filter(|n| n.customer_id == customer_id)
                    .cloned()
                    .collect()
            })
        }

        async fn list_by_customer_and_type(
            &self,
            ctx: &CallContext,
            customer_id: i64,
            note_type: NoteType,
        ) -> RepoResult<Vec<CustomerNote>> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .rev()
                    .filter(|n| n.customer_id == customer_id && n.note_type == note_type)
                    .cloned()
                    .collect()
            })
        }

        async fn list_by_staff(
            &self,
            ctx: &CallContext,
            staff_id: &str,
            _page: u32,
            _limit: u32,
        ) -> RepoResult<Page<CustomerNote>> {
            self.with(ctx, |s| {
                page_of(
                    s.notes
                        .iter()
                        .filter(|n| n.staff_id == staff_id)
                        .cloned()
                        .collect(),
                )
            })
        }

        async fn list_recent(&self, ctx: &CallContext, limit: u32) -> RepoResult<Vec<CustomerNote>> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
        }

        async fn list_by_date_range(
            &self,
            ctx: &CallContext,
            customer_id: Option<i64>,
            from: Option<DateTime<Utc>>,
            to: Option<DateTime<Utc>>,
        ) -> RepoResult<Vec<CustomerNote>> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .filter(|n| {
                        customer_id.is_none_or(|id| n.customer_id == id)
                            && from.is_none_or(|f| n.created_at >= f)
                            && to.is_none_or(|t| n.created_at <= t)
                    })
                    .cloned()
                    .collect()
            })
        }

        async fn list_recent_by_customer(
            &self,
            ctx: &CallContext,
            customer_id: i64,
            limit: u32,
        ) -> RepoResult<Vec<CustomerNote>> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .rev()
                    .filter(|n| n.customer_id == customer_id)
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
        }

        async fn count(&self, ctx: &CallContext) -> RepoResult<u64> {
            self.with(ctx, |s| s.notes.len() as u64)
        }

        async fn count_by_customer(&self, ctx: &CallContext, customer_id: i64) -> RepoResult<u64> {
            self.with(ctx, |s| {
                s.notes
                    .iter()
                    .filter(|n| n.customer_id == customer_id)
                    .count() as u64
            })
        }
    }

    fn services() -> (Arc<MemStore>, CustomerService, VehicleService) {
        let store = Arc::new(MemStore::default());
        let customers = CustomerService::new(store.clone(), store.clone(), store.clone());
        let vehicles = VehicleService::new(store.clone(), store.clone());
        (store, customers, vehicles)
    }

    fn ctx() -> CallContext {
        CallContext::builder()
            .tenant(TenantId::from_uuid(Uuid::new_v4()))
            .staff("u-7", "Sam Lee")
            .build()
    }

    fn new_customer(first: &str, email: Option<&str>) -> NewCustomer {
        NewCustomer {
            first_name: first.to_owned(),
            last_name: "Ruiz".to_owned(),
            email: email.map(str::to_owned),
            ..NewCustomer::default()
        }
    }

    fn new_vehicle(customer_id: i64, vin: Option<&str>, plate: Option<&str>) -> NewVehicle {
        NewVehicle {
            customer_id,
            make: "Toyota".to_owned(),
            model: "Corolla".to_owned(),
            year: 2018,
            vin: vin.map(str::to_owned),
            license_plate: plate.map(str::to_owned),
            ..NewVehicle::default()
        }
    }

    #[tokio::test]
    async fn create_customer_requires_tenant() {
        let (store, customers, _) = services();
        let err = customers
            .create_customer(&CallContext::anonymous(), new_customer("Ana", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::MissingTenant));
        assert!(store.state.lock().unwrap().customers.is_empty());
    }

    #[tokio::test]
    async fn create_customer_rejects_duplicate_email() {
        let (_, customers, _) = services();
        let ctx = ctx();
        customers
            .create_customer(&ctx, new_customer("Ana", Some("ana@example.com")))
            .await
            .unwrap();

        let err = customers
            .create_customer(&ctx, new_customer("Eva", Some("ana@example.com")))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DomainError::Duplicate { field: "email", .. }),
            "{err}"
        );
    }

    #[tokio::test]
    async fn create_customer_validates_before_storing() {
        let (store, customers, _) = services();
        let err = customers
            .create_customer(&ctx(), new_customer("  ", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "first_name"));
        assert!(store.state.lock().unwrap().customers.is_empty());
    }

    #[tokio::test]
    async fn update_customer_is_partial() {
        let (_, customers, _) = services();
        let ctx = ctx();
        let mut new = new_customer("Ana", Some("ana@example.com"));
        new.phone = Some("555-0100".to_owned());
        let created = customers.create_customer(&ctx, new).await.unwrap();

        let updated = customers
            .update_customer(
                &ctx,
                created.id,
                CustomerUpdate {
                    email: Some("ana.ruiz@example.com".to_owned()),
                    ..CustomerUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.email.as_deref(), Some("ana.ruiz@example.com"));
        assert_eq!(updated.first_name, "Ana");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert!(updated.is_active);
    }

    #[tokio::test]
    async fn update_customer_keeping_own_email_is_not_a_duplicate() {
        let (_, customers, _) = services();
        let ctx = ctx();
        let created = customers
            .create_customer(&ctx, new_customer("Ana", Some("ana@example.com")))
            .await
            .unwrap();

        let updated = customers
            .update_customer(
                &ctx,
                created.id,
                CustomerUpdate {
                    email: Some("ana@example.com".to_owned()),
                    last_name: Some("Lopez".to_owned()),
                    ..CustomerUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.last_name, "Lopez");
    }

    #[tokio::test]
    async fn delete_customer_with_active_vehicle_deactivates() {
        let (store, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, None, Some("ABC-123")))
            .await
            .unwrap();

        customers.delete_customer(&ctx, c.id).await.unwrap();

        let stored = customers.get_customer(&ctx, c.id, false, false).await.unwrap();
        assert!(!stored.is_active);
        assert_eq!(store.state.lock().unwrap().vehicles.len(), 1);
    }

    #[tokio::test]
    async fn delete_customer_without_active_vehicles_removes_it() {
        let (_, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        let v = vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, None, None))
            .await
            .unwrap();
        vehicles.deactivate_vehicle(&ctx, v.id).await.unwrap();

        customers.delete_customer(&ctx, c.id).await.unwrap();

        let err = customers
            .get_customer(&ctx, c.id, false, false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn blank_search_returns_nothing() {
        let (_, customers, _) = services();
        let ctx = ctx();
        customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();

        let found = customers
            .search_customers(&ctx, &CustomerSearch::new("   ", 10))
            .await
            .unwrap();
        assert!(found.is_empty());

        let found = customers
            .search_customers(&ctx, &CustomerSearch::new("Ana", 10))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn get_customer_includes_relations_on_request() {
        let (_, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, None, None))
            .await
            .unwrap();
        for i in 0..12 {
            customers
                .add_customer_note(
                    &ctx,
                    NewCustomerNote {
                        customer_id: c.id,
                        staff_id: "u-7".to_owned(),
                        staff_name: "Sam Lee".to_owned(),
                        note: format!("visit {i}"),
                        note_type: NoteType::Service,
                    },
                )
                .await
                .unwrap();
        }

        let bare = customers.get_customer(&ctx, c.id, false, false).await.unwrap();
        assert!(bare.vehicles.is_none());
        assert!(bare.customer_notes.is_none());

        let full = customers.get_customer(&ctx, c.id, true, true).await.unwrap();
        assert_eq!(full.vehicles.map(|v| v.len()), Some(1));
        let notes = full.customer_notes.unwrap();
        assert_eq!(notes.len(), 10);
        assert_eq!(notes[0].note, "visit 11");
    }

    #[tokio::test]
    async fn note_for_missing_customer_is_not_found() {
        let (store, customers, _) = services();
        let err = customers
            .add_customer_note(
                &ctx(),
                NewCustomerNote {
                    customer_id: 404,
                    staff_id: "u-7".to_owned(),
                    staff_name: "Sam Lee".to_owned(),
                    note: "hello".to_owned(),
                    note_type: NoteType::General,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "customer", .. }));
        assert!(store.state.lock().unwrap().notes.is_empty());
    }

    #[tokio::test]
    async fn notes_filtered_by_type_or_limit() {
        let (_, customers, _) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        for t in [NoteType::Complaint, NoteType::General, NoteType::Complaint] {
            customers
                .add_customer_note(
                    &ctx,
                    NewCustomerNote {
                        customer_id: c.id,
                        staff_id: "u-7".to_owned(),
                        staff_name: "Sam Lee".to_owned(),
                        note: t.to_string(),
                        note_type: t,
                    },
                )
                .await
                .unwrap();
        }

        let complaints = customers
            .get_customer_notes(&ctx, c.id, Some(NoteType::Complaint), 0)
            .await
            .unwrap();
        assert_eq!(complaints.len(), 2);
        let recent = customers
            .get_customer_notes(&ctx, c.id, None, 1)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        let all = customers.get_customer_notes(&ctx, c.id, None, 0).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn preferences_round_trip_and_missing_key() {
        let (_, customers, _) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();

        customers
            .set_customer_preference(&ctx, c.id, "contact", PropertyValue::from("sms"))
            .await
            .unwrap();
        let value = customers
            .get_customer_preference(&ctx, c.id, "contact")
            .await
            .unwrap();
        assert_eq!(value.as_str(), Some("sms"));

        let err = customers
            .get_customer_preference(&ctx, c.id, "language")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "preference", .. }));
    }

    #[tokio::test]
    async fn vehicle_for_missing_customer_is_not_found() {
        let (_, _, vehicles) = services();
        let err = vehicles
            .create_vehicle(&ctx(), new_vehicle(99, None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "customer", .. }));
    }

    #[tokio::test]
    async fn vehicle_vin_is_validated_and_unique() {
        let (_, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();

        let err = vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, Some("1HGCM82633A00435O"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "vin"));

        vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, Some("1HGCM82633A004352"), None))
            .await
            .unwrap();
        let err = vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, Some("1HGCM82633A004352"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { field: "vin", .. }));
    }

    #[tokio::test]
    async fn update_vehicle_checks_plate_against_others() {
        let (_, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, None, Some("AAA-111")))
            .await
            .unwrap();
        let second = vehicles
            .create_vehicle(&ctx, new_vehicle(c.id, None, Some("BBB-222")))
            .await
            .unwrap();

        let err = vehicles
            .update_vehicle(
                &ctx,
                second.id,
                VehicleUpdate {
                    license_plate: Some("AAA-111".to_owned()),
                    ..VehicleUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { field: "license_plate", .. }));

        let updated = vehicles
            .update_vehicle(
                &ctx,
                second.id,
                VehicleUpdate {
                    color: Some("red".to_owned()),
                    ..VehicleUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.license_plate.as_deref(), Some("BBB-222"));
        assert_eq!(updated.color.as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn batch_rejects_duplicates_within_itself() {
        let (store, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();

        let err = vehicles
            .create_vehicles_for_customer(
                &ctx,
                c.id,
                vec![
                    new_vehicle(0, None, Some("DUP-1")),
                    new_vehicle(0, None, Some("DUP-1")),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Duplicate { field: "license_plate", .. }));
        assert!(store.state.lock().unwrap().vehicles.is_empty());

        let created = vehicles
            .create_vehicles_for_customer(
                &ctx,
                c.id,
                vec![new_vehicle(0, None, Some("P-1")), new_vehicle(0, None, Some("P-2"))],
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|v| v.customer_id == c.id));
    }

    #[tokio::test]
    async fn compatibility_info_counts_neighbours() {
        let (_, customers, vehicles) = services();
        let ctx = ctx();
        let c = customers
            .create_customer(&ctx, new_customer("Ana", None))
            .await
            .unwrap();
        let mut years = Vec::new();
        for year in [2018, 2018, 2016, 2021, 2022] {
            let mut new = new_vehicle(c.id, None, None);
            new.year = year;
            years.push(vehicles.create_vehicle(&ctx, new).await.unwrap());
        }

        let info = vehicles
            .get_vehicle_compatibility_info(&ctx, years[0].id)
            .await
            .unwrap();
        assert_eq!(info.compatibility_string, "Toyota Corolla 2018");
        assert_eq!(info.exact_matches, 1);
        assert_eq!(info.compatible_vehicles, 4);
        assert_eq!((info.year_from, info.year_to), (2015, 2021));
    }

    #[tokio::test]
    async fn list_by_customer_requires_the_customer() {
        let (_, _, vehicles) = services();
        let err = vehicles
            .list_vehicles_by_customer(&ctx(), 5)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let filter = VehicleFilter::default();
        assert!(
            vehicles
                .list_vehicles(&ctx(), &filter)
                .await
                .unwrap()
                .items
                .is_empty()
        );
    }
}
