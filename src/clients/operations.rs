//! Operations of the remote API, built on [`ApiClient::call`].

use serde_json::json;
use tokio::time::Instant;

use crate::clients::errors::QueryError;
use crate::clients::ApiClient;
use crate::config::Endpoints;
use crate::models::{
    Order, OrderPayment, PaymentMethod, PaymentProvider, PaymentType, ReservedOrder, Store,
};

/// Cancellation reason sent when aborting an order.
const CANCEL_REASON_ID: u32 = 1;

/// Page requested by store searches.
const SEARCH_PAGE: u32 = 1;

impl ApiClient {
    /// Searches the stores around the configured origin.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the call fails or the response cannot be
    /// parsed.
    pub async fn list_stores(&mut self) -> Result<Vec<Store>, QueryError> {
        let path = self.config.endpoints().items.clone();
        let search = self.config.search().clone();

        let result = self
            .call_with(
                &path,
                |session| {
                    json!({
                        "user_id": session.user_id,
                        "origin": search.origin,
                        "radius": search.radius_in_km,
                        "page_size": search.nb_max_results,
                        "page": SEARCH_PAGE,
                        "discover": false,
                        "favorites_only": search.favorites_only,
                        "with_stock_only": search.with_stock_only,
                    })
                },
                true,
            )
            .await?;

        let stores = Store::parse_list(&result.body)?;
        if !stores.is_empty() {
            tracing::info!("found {} store(s)", stores.len());
        }
        Ok(stores)
    }

    /// Lists the orders waiting for pickup.
    ///
    /// The listing is only queried once per reminder period; in between,
    /// an empty list is returned without any request.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the call fails or the response cannot be
    /// parsed.
    pub async fn list_open_orders(&mut self) -> Result<Vec<Order>, QueryError> {
        if !self.reminder.due(Instant::now()) {
            return Ok(Vec::new());
        }

        let path = self.config.endpoints().active_orders.clone();
        let result = self
            .call_with(&path, |session| json!({ "user_id": session.user_id }), true)
            .await?;

        let orders = Order::parse_list(&result.body)?;
        if !orders.is_empty() {
            tracing::info!("you have {} order(s) to pick up, don't forget them:", orders.len());
            for (position, order) in orders.iter().enumerate() {
                tracing::info!("- Order {} - {}", position + 1, order);
            }
        }
        Ok(orders)
    }

    /// Lists the payment methods registered with `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the call fails or the response cannot be
    /// parsed.
    pub async fn payment_methods(
        &mut self,
        provider: PaymentProvider,
    ) -> Result<Vec<PaymentMethod>, QueryError> {
        let path = self.config.endpoints().payment_methods.clone();
        let payload = json!({
            "supported_types": [{
                "provider": provider,
                "payment_types": PaymentType::REQUESTED,
            }]
        });
        let result = self.call(&path, &payload, true).await?;

        let methods = PaymentMethod::parse_list(&result.body)?;
        tracing::info!("you have {} payment method(s)", methods.len());
        for (position, method) in methods.iter().enumerate() {
            tracing::debug!("- Payment method {}: {}", position + 1, method);
        }
        Ok(methods)
    }

    /// Reserves `bags` bags in `store`.
    ///
    /// The request is sent without pacing.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NotEnoughBags`] without sending anything when
    /// the store does not have enough bags, and any other [`QueryError`] if
    /// the call fails or the reservation is not successful.
    pub async fn reserve_order(
        &mut self,
        store: &Store,
        bags: u32,
    ) -> Result<ReservedOrder, QueryError> {
        if store.available_bags < bags {
            return Err(QueryError::NotEnoughBags {
                store_id: store.id.clone(),
                requested: bags,
                available: store.available_bags,
            });
        }

        let path = Endpoints::with_id(&self.config.endpoints().create_order, &store.id);
        let result = self
            .call(&path, &json!({ "item_count": bags }), false)
            .await?;

        let order = ReservedOrder::parse(&result.body)?;
        tracing::info!("reserved {}", order);
        Ok(order)
    }

    /// Cancels the order `order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the call fails.
    pub async fn cancel_order(&mut self, order_id: &str) -> Result<(), QueryError> {
        let path = Endpoints::with_id(&self.config.endpoints().abort_order, order_id);
        self.call(&path, &json!({ "cancel_reason_id": CANCEL_REASON_ID }), true)
            .await?;
        tracing::info!("cancelled order {}", order_id);
        Ok(())
    }

    /// Pays the order `order_id` with `method`.
    ///
    /// The payment status is looked up right after; a failure of that
    /// lookup is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the payment call fails or its response
    /// cannot be parsed.
    pub async fn pay_order(
        &mut self,
        order_id: &str,
        method: &PaymentMethod,
    ) -> Result<OrderPayment, QueryError> {
        let path = Endpoints::with_id(&self.config.endpoints().pay_order, order_id);
        let result = self.call(&path, &method.authorization(), true).await?;

        let payment = OrderPayment::parse(&result.body)?;
        tracing::info!("order payment {} created", payment);

        match self.payment_status(&payment.id).await {
            Ok(status) => tracing::info!("payment information of {} is {}", payment.id, status),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => tracing::warn!("cannot look up payment {}: {}", payment.id, e),
        }
        Ok(payment)
    }

    /// Looks up the status of the payment `payment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the call fails or the response is not JSON.
    pub async fn payment_status(
        &mut self,
        payment_id: &str,
    ) -> Result<serde_json::Value, QueryError> {
        let path = Endpoints::with_id(&self.config.endpoints().payment_status, payment_id);
        let result = self.call(&path, &json!({}), true).await?;
        if result.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(result.json("payment status")?)
    }
}
