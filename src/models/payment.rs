use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::models::{from_json, ParseError};

/// Return URL announced when paying an order.
pub const PAYMENT_RETURN_URL: &str = "adyencheckout://com.app.tgtg.itemview";

/// A payment service provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentProvider {
    /// Pay at pickup.
    Cash,
    /// Braintree.
    Braintree,
    /// Adyen.
    Adyen,
    /// Satispay.
    Satispay,
}

impl PaymentProvider {
    /// Returns the wire name of the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Braintree => "BRAINTREE",
            Self::Adyen => "ADYEN",
            Self::Satispay => "SATISPAY",
        }
    }

    /// Returns the authorization payload type expected for this provider.
    #[must_use]
    pub const fn authorization_payload_type(self) -> &'static str {
        match self {
            Self::Cash => "cashAuthorizationPayload",
            Self::Braintree => "braintreeAuthorizationPayload",
            Self::Adyen => "adyenAuthorizationPayload",
            Self::Satispay => "satispayAuthorizationPayload",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A means of payment offered by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentType {
    /// Credit card.
    CreditCard,
    /// Google Pay.
    GooglePay,
    /// Bancontact mobile.
    BcMcMobile,
    /// Bancontact card.
    BcMcCard,
    /// Vipps.
    Vipps,
    /// Twint.
    Twint,
    /// MB Way.
    MbWay,
    /// Swish.
    Swish,
    /// Blik.
    Blik,
    /// Venmo.
    Venmo,
    /// Placeholder for upcoming payment types.
    #[serde(rename = "FAKE_DOOR")]
    FakeDoor,
    /// PayPal.
    PayPal,
    /// Sofort.
    Sofort,
}

impl PaymentType {
    /// Payment types requested when listing payment methods.
    pub const REQUESTED: [Self; 3] = [Self::CreditCard, Self::PayPal, Self::GooglePay];
}

/// A payment method registered on the account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PaymentMethod {
    /// Method identifier.
    #[serde(rename = "identifier", default)]
    pub id: String,
    /// Provider-specific type.
    #[serde(rename = "type", default)]
    pub internal_type: String,
    /// Opaque payload handed back to the provider when paying.
    #[serde(default)]
    pub adyen_api_payload: String,
    /// Human-readable summary, such as masked card digits.
    #[serde(default)]
    pub display_value: String,
    /// Whether the provider should keep the method, as sent by the service.
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub save_payment_method: String,
    /// Payment provider.
    #[serde(rename = "payment_provider", default)]
    pub provider: Option<PaymentProvider>,
    /// Payment type.
    #[serde(default)]
    pub payment_type: Option<PaymentType>,
    /// Whether this is the preferred method.
    #[serde(rename = "preferred", default)]
    pub is_preferred: bool,
}

#[derive(Deserialize)]
struct PaymentMethodsResponse {
    #[serde(default)]
    payment_methods: Vec<PaymentMethod>,
}

fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl PaymentMethod {
    /// Parses the body of a payment methods listing.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body does not match the schema,
    /// including unknown providers or payment types.
    pub fn parse_list(body: &[u8]) -> Result<Vec<Self>, ParseError> {
        let response: PaymentMethodsResponse = from_json("payment methods", body)?;
        Ok(response.payment_methods)
    }

    /// Returns the authorization sent to pay an order with this method.
    #[must_use]
    pub fn authorization(&self) -> serde_json::Value {
        let provider = self.provider.unwrap_or(PaymentProvider::Adyen);
        let mut payload = json!({
            "type": provider.authorization_payload_type(),
            "payment_type": self.payment_type,
            "payload": self.adyen_api_payload,
        });
        if !self.save_payment_method.is_empty() {
            payload["save_payment_method"] = json!(self.save_payment_method);
        }
        json!({
            "authorization": {
                "authorization_payload": payload,
                "payment_provider": provider,
                "return_url": PAYMENT_RETURN_URL,
            }
        })
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self
            .payment_type
            .and_then(|t| serde_json::to_value(t).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(
            f,
            "{} {}, preferred={}",
            kind, self.display_value, self.is_preferred
        )
    }
}

/// The payment created for an order.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OrderPayment {
    /// Payment identifier, used to query its status.
    #[serde(rename = "payment_id", default)]
    pub id: String,
    /// The paid order.
    #[serde(default)]
    pub order_id: String,
    /// Provider handling the payment.
    #[serde(rename = "payment_provider")]
    pub provider: PaymentProvider,
    /// Payment state.
    #[serde(default)]
    pub state: String,
}

impl OrderPayment {
    /// Parses the body of a pay order response.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if the body does not match the schema.
    pub fn parse(body: &[u8]) -> Result<Self, ParseError> {
        from_json("order payment", body)
    }
}

impl fmt::Display for OrderPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Payment # {} of order # {} via {} ({})",
            self.id, self.order_id, self.provider, self.state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METHODS: &str = r#"{
        "payment_methods": [
            {
                "identifier": "pm-1",
                "type": "scheme",
                "adyen_api_payload": "{\"brand\":\"visa\"}",
                "display_value": "**** 1234",
                "payment_provider": "ADYEN",
                "payment_type": "CREDITCARD",
                "preferred": true
            },
            {
                "identifier": "pm-2",
                "payment_provider": "ADYEN",
                "payment_type": "PAYPAL",
                "save_payment_method": true
            }
        ]
    }"#;

    #[test]
    fn test_parse_list() {
        let methods = PaymentMethod::parse_list(METHODS.as_bytes()).unwrap();
        assert_eq!(methods.len(), 2);

        assert_eq!(methods[0].id, "pm-1");
        assert_eq!(methods[0].internal_type, "scheme");
        assert_eq!(methods[0].provider, Some(PaymentProvider::Adyen));
        assert_eq!(methods[0].payment_type, Some(PaymentType::CreditCard));
        assert!(methods[0].is_preferred);

        assert_eq!(methods[1].payment_type, Some(PaymentType::PayPal));
        assert_eq!(methods[1].save_payment_method, "true");
        assert!(!methods[1].is_preferred);
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let body = r#"{"payment_methods": [{"payment_provider": "BITCOIN"}]}"#;
        assert!(PaymentMethod::parse_list(body.as_bytes()).is_err());
    }

    #[test]
    fn test_payment_type_wire_names() {
        assert_eq!(serde_json::to_value(PaymentType::FakeDoor).unwrap(), "FAKE_DOOR");
        assert_eq!(serde_json::to_value(PaymentType::BcMcMobile).unwrap(), "BCMCMOBILE");
        assert_eq!(serde_json::to_value(PaymentType::GooglePay).unwrap(), "GOOGLEPAY");
        assert_eq!(serde_json::to_value(PaymentProvider::Satispay).unwrap(), "SATISPAY");
    }

    #[test]
    fn test_authorization_payload() {
        let methods = PaymentMethod::parse_list(METHODS.as_bytes()).unwrap();
        let authorization = methods[0].authorization();
        assert_eq!(
            authorization,
            json!({
                "authorization": {
                    "authorization_payload": {
                        "type": "adyenAuthorizationPayload",
                        "payment_type": "CREDITCARD",
                        "payload": "{\"brand\":\"visa\"}"
                    },
                    "payment_provider": "ADYEN",
                    "return_url": "adyencheckout://com.app.tgtg.itemview"
                }
            })
        );

        let authorization = methods[1].authorization();
        assert_eq!(
            authorization["authorization"]["authorization_payload"]["save_payment_method"],
            "true"
        );
    }

    #[test]
    fn test_parse_order_payment() {
        let body = r#"{"payment_id":"pay-1","order_id":"o-1","payment_provider":"ADYEN","state":"AUTHORIZED"}"#;
        let payment = OrderPayment::parse(body.as_bytes()).unwrap();
        assert_eq!(payment.id, "pay-1");
        assert_eq!(payment.order_id, "o-1");
        assert_eq!(payment.provider, PaymentProvider::Adyen);
        assert_eq!(payment.state, "AUTHORIZED");
    }
}
