//! Zuora object descriptions returned by `GET /v1/describe/{resource}`.

use std::fmt;

use roxmltree::{Document, Node};

use crate::error::{Error, Result};

/// Objects the describe endpoint knows about.
pub const ZUORA_RESOURCES: &[&str] = &[
    "Account",
    "AccountingCode",
    "AccountingPeriod",
    "Amendment",
    "BillingRun",
    "BillTo",
    "CommunicationProfile",
    "Contact",
    "ContactSnapshot",
    "CreditBalanceAdjustment",
    "CreditMemo",
    "CreditMemoApplication",
    "CreditMemoApplicationItem",
    "CreditMemoItem",
    "CreditMemoPart",
    "CreditMemoPartItem",
    "CreditTaxationItem",
    "DebitMemo",
    "DebitMemoItem",
    "DebitTaxationItem",
    "DiscountAppliedMetrics",
    "Export",
    "Feature",
    "Import",
    "Invoice",
    "InvoiceAdjustment",
    "InvoiceItem",
    "InvoiceItemAdjustment",
    "InvoicePayment",
    "JournalEntry",
    "JournalEntryDetail",
    "JournalEntryItem",
    "JournalRun",
    "Order",
    "OrderAction",
    "OrderElp",
    "OrderItem",
    "OrderMrr",
    "OrderQuantity",
    "OrderTcb",
    "OrderTcv",
    "Payment",
    "PaymentApplication",
    "PaymentApplicationItem",
    "PaymentMethod",
    "PaymentMethodSnapshot",
    "PaymentMethodTransactionLog",
    "PaymentPart",
    "PaymentPartItem",
    "PaymentRun",
    "PaymentTransactionLog",
    "ProcessedUsage",
    "Product",
    "ProductFeature",
    "ProductRatePlan",
    "ProductRatePlanCharge",
    "ProductRatePlanChargeTier",
    "RatePlan",
    "RatePlanCharge",
    "RatePlanChargeTier",
    "Refund",
    "RefundApplication",
    "RefundApplicationItem",
    "RefundInvoicePayment",
    "RefundPart",
    "RefundPartItem",
    "RefundTransactionLog",
    "RevenueChargeSummary",
    "RevenueChargeSummaryItem",
    "RevenueEvent",
    "RevenueEventItem",
    "RevenueSchedule",
    "RevenueScheduleItem",
    "SoldTo",
    "Subscription",
    "SubscriptionProductFeature",
    "TaxableItemSnapshot",
    "TaxationItem",
    "UpdaterBatch",
    "UpdaterDetail",
    "Usage",
];

/// Fails with [`Error::ResourceNotFound`] for names outside [`ZUORA_RESOURCES`].
pub fn ensure_known_resource(name: &str) -> Result<()> {
    if ZUORA_RESOURCES.contains(&name) {
        Ok(())
    } else {
        Err(Error::ResourceNotFound {
            name: name.to_string(),
            available: ZUORA_RESOURCES.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedObject {
    pub name: String,
    pub label: String,
    /// Last path segment of the relation URL.
    pub object_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescription {
    pub name: String,
    pub label: String,
    pub fields: Vec<Field>,
    pub related_objects: Vec<RelatedObject>,
}

impl ResourceDescription {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).map_err(|e| Error::InvalidDescription(e.to_string()))?;
        let root = doc.root_element();

        let fields = child(root, "fields")
            .map(|fields| {
                elements(fields)
                    .map(|field| Field {
                        name: child_text(field, "name"),
                        label: child_text(field, "label"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let related_objects = child(root, "related-objects")
            .map(|related| {
                elements(related)
                    .map(|object| RelatedObject {
                        name: child_text(object, "name"),
                        label: child_text(object, "label"),
                        object_type: object
                            .attributes()
                            .next()
                            .map(|attr| {
                                attr.value().rsplit('/').next().unwrap_or_default().to_string()
                            })
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: child_text(root, "name"),
            label: child_text(root, "label"),
            fields,
            related_objects,
        })
    }
}

impl fmt::Display for ResourceDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label)?;
        for field in &self.fields {
            writeln!(f, "  {} - {}", field.name, field.label)?;
        }
        writeln!(f, "Related Objects")?;
        for object in &self.related_objects {
            writeln!(f, "  {}<{}> - {}", object.name, object.object_type, object.label)?;
        }
        Ok(())
    }
}

/// Renders the describe listing for a raw XML document.
pub fn render_description(xml: &str) -> Result<String> {
    Ok(ResourceDescription::parse(xml)?.to_string())
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    elements(node).find(|n| n.tag_name().name() == tag)
}

fn child_text(node: Node<'_, '_>, tag: &str) -> String {
    child(node, tag)
        .and_then(|n| n.text())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}
