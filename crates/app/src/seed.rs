//! Demo data for a fresh database.

use anyhow::Context;
use common::{Money, ProductId};
use domain::{FulfillmentService, OrderRequest};
use store::{
    CatalogStore, NewAddress, NewProduct, OrderStatus, OrderStore, PostgresUserDirectory,
};

struct DemoCustomer {
    username: &'static str,
    email: &'static str,
    description: &'static str,
    street: &'static str,
    city: &'static str,
    country: &'static str,
}

const CUSTOMERS: &[DemoCustomer] = &[
    DemoCustomer {
        username: "mikhail_ryzhov",
        email: "m.ryzhov@mail.net",
        description: "Cashier",
        street: "7 Sunset Boulevard",
        city: "Sydney",
        country: "Australia",
    },
    DemoCustomer {
        username: "clare_davis",
        email: "clare.d@inbox.org",
        description: "Pirate",
        street: "45 Canal Street",
        city: "Amsterdam",
        country: "Netherlands",
    },
    DemoCustomer {
        username: "kenji_tanaka",
        email: "k.tanaka@global.jp",
        description: "Dentist",
        street: "18 Nevsky Prospect",
        city: "Saint Petersburg",
        country: "Russia",
    },
    DemoCustomer {
        username: "fatima_nkosi",
        email: "fatima.nkosi@africa.co.za",
        description: "Chauffeur",
        street: "99 Queen Street",
        city: "Toronto",
        country: "Canada",
    },
    DemoCustomer {
        username: "lucas_fernandez",
        email: "lucasf@correo.es",
        description: "Programmer",
        street: "3 Al-Rashid Street",
        city: "Dubai",
        country: "United Arab Emirates",
    },
];

/// (name, price in cents, description, category, stock)
const PRODUCTS: &[(&str, u64, &str, &str, u32)] = &[
    ("Laptop", 12_000_000, "Gaming laptop", "electronics", 10),
    ("Wireless headphones", 650_000, "Noise cancelling", "electronics", 25),
    ("Banana t-shirt", 335_900, "Cotton, size XXL", "clothing", 40),
    ("Bible", 25_000, "A good book", "books", 100),
    ("Coffee machine", 1_899_900, "With milk frother", "appliances", 8),
];

/// What a seeding run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub products: usize,
    pub orders: usize,
    pub shipped: usize,
}

/// Seeds demo customers, products and one order per customer, then ships
/// the first order.
///
/// Does nothing if any user already exists.
#[tracing::instrument(skip_all)]
pub async fn seed_demo<C, O>(
    users: &PostgresUserDirectory,
    service: &FulfillmentService<C, O, PostgresUserDirectory>,
) -> anyhow::Result<SeedSummary>
where
    C: CatalogStore,
    O: OrderStore,
{
    let existing = users.user_count().await?;
    if existing > 0 {
        tracing::info!(existing, "database already has users, skipping demo seed");
        return Ok(SeedSummary::default());
    }

    let mut summary = SeedSummary::default();

    let mut customers = Vec::with_capacity(CUSTOMERS.len());
    for customer in CUSTOMERS {
        let user = users
            .create_user(customer.username, customer.email, Some(customer.description))
            .await
            .with_context(|| format!("creating demo user {}", customer.username))?;
        let address_id = users
            .add_address(
                user.id,
                &NewAddress {
                    street: customer.street.to_string(),
                    city: customer.city.to_string(),
                    state: None,
                    zip_code: None,
                    country: customer.country.to_string(),
                    is_primary: true,
                },
            )
            .await?;
        customers.push((user.id, address_id));
        summary.users += 1;
    }

    let mut products: Vec<ProductId> = Vec::with_capacity(PRODUCTS.len());
    for (name, cents, description, category, stock) in PRODUCTS {
        let price = Money::from_cents(*cents);
        let product = service
            .catalog()
            .create_product(
                NewProduct::new(*name, price, *stock)
                    .with_description(*description)
                    .with_category(*category),
            )
            .await?;
        products.push(product.id);
        summary.products += 1;
    }

    let mut placed = Vec::with_capacity(customers.len());
    for ((user_id, address_id), product_id) in customers.iter().zip(&products) {
        let order = service
            .create_order(OrderRequest::new(*user_id, *address_id).with_item(*product_id, 1))
            .await
            .context("placing demo order")?;
        tracing::debug!(order_id = %order.id, total = %order.total_amount, "demo order placed");
        placed.push(order.id);
        summary.orders += 1;
    }

    if let Some(first) = placed.first() {
        service
            .update_order_status(*first, OrderStatus::Shipped)
            .await
            .context("shipping demo order")?;
        summary.shipped += 1;
    }

    tracing::info!(
        users = summary.users,
        products = summary.products,
        orders = summary.orders,
        shipped = summary.shipped,
        "demo data seeded"
    );
    Ok(summary)
}
