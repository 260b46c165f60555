//! # Seed Data Generator
//!
//! Populates the document store with a small CRM dataset for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 leads (default) plus users, inventory and orders
//! cargo run -p salesdesk-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p salesdesk-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p salesdesk-db --bin seed -- --db ./data/salesdesk.db
//! ```
//!
//! ## Generated Data
//! - Users: one super admin, a sales head, sales people and retail staff
//! - Inventory: a handful of events, some split into priced categories
//! - Leads: spread across statuses, sources, campaigns and sales people
//! - Orders + allocations: one per converted lead, mixing INR and USD
//!
//! Values are derived from the row index, so two runs produce the same data.

use chrono::{Duration, Utc};
use std::env;

use salesdesk_core::{
    Allocation, BusinessType, Department, Inventory, InventoryCategory, Lead, LeadStatus, Order,
    OrderStatus, Role, Temperature, User,
};
use salesdesk_db::{new_id, Database, DbConfig, WriteOp};

/// (name, email, role, department)
const USERS: &[(&str, &str, Role, Department)] = &[
    ("Admin", "admin@salesdesk.dev", Role::SuperAdmin, Department::Admin),
    ("Meera Kapoor", "meera@salesdesk.dev", Role::SalesHead, Department::Sales),
    ("Arjun Rao", "arjun@salesdesk.dev", Role::SalesPerson, Department::Sales),
    ("Priya Nair", "priya@salesdesk.dev", Role::SalesPerson, Department::Sales),
    ("Kabir Shah", "kabir@salesdesk.dev", Role::SalesManager, Department::Sales),
    ("Neha Gupta", "neha@salesdesk.dev", Role::SalesPerson, Department::Retail),
    ("Rohan Das", "rohan@salesdesk.dev", Role::SalesPerson, Department::Retail),
];

/// (event, days from today, tickets, buying price, selling price, categorized)
const EVENTS: &[(&str, i64, i64, f64, f64, bool)] = &[
    ("IPL Final 2025", 20, 400, 8_000.0, 12_500.0, true),
    ("Wimbledon Finals", 45, 120, 65_000.0, 90_000.0, true),
    ("F1 Abu Dhabi GP", 80, 200, 40_000.0, 55_000.0, false),
    ("India vs Australia ODI", -15, 300, 3_500.0, 6_000.0, false),
    ("Coldplay Mumbai", 120, 500, 9_000.0, 15_000.0, true),
];

const SOURCES: &[&str] = &["Facebook", "Instagram", "Google", "Referral", "Website"];
const CAMPAIGNS: &[&str] = &["IPL Hospitality", "Wimbledon 2025", "F1 Weekend", "Concerts"];

const STATUSES: &[LeadStatus] = &[
    LeadStatus::Unassigned,
    LeadStatus::Assigned,
    LeadStatus::Contacted,
    LeadStatus::Attempt1,
    LeadStatus::Qualified,
    LeadStatus::Hot,
    LeadStatus::Warm,
    LeadStatus::Cold,
    LeadStatus::QuoteRequested,
    LeadStatus::Junk,
    LeadStatus::Dropped,
    LeadStatus::Converted,
    LeadStatus::PaymentReceived,
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./salesdesk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("SalesDesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of leads to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./salesdesk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 SalesDesk Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Leads:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.leads().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} leads", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut ops: Vec<WriteOp> = Vec::new();

    // Users
    let users: Vec<User> = USERS
        .iter()
        .map(|(name, email, role, department)| User {
            id: new_id(),
            name: name.to_string(),
            email: email.to_string(),
            role: *role,
            department: Some(*department),
            status: Some("active".to_string()),
            created_date: Some(Utc::now()),
            ..Default::default()
        })
        .collect();
    for user in &users {
        ops.push(WriteOp::set(db.users().collection(), &user.id, user)?);
    }
    let sellers: Vec<&User> = users.iter().filter(|u| u.role.is_sales_role()).collect();

    // Inventory
    let inventory: Vec<Inventory> = EVENTS
        .iter()
        .map(|(name, days, tickets, buying, selling, categorized)| {
            generate_inventory(name, *days, *tickets, *buying, *selling, *categorized)
        })
        .collect();
    for item in &inventory {
        ops.push(WriteOp::set(db.inventory().collection(), &item.id, item)?);
    }
    println!("✓ Prepared {} users and {} inventory items", users.len(), inventory.len());

    // Leads, with an order and allocation for each converted one
    let mut orders = 0;
    for seed in 0..count {
        let seller = sellers[seed % sellers.len()];
        let lead = generate_lead(seed, seller);

        if lead.status.is_converted() {
            let item = &inventory[seed % inventory.len()];
            let (order, allocation) = generate_order(seed, &lead, seller, item);
            ops.push(WriteOp::set(db.orders().collection(), &order.id, &order)?);
            ops.push(WriteOp::set(db.allocations().collection(), &allocation.id, &allocation)?);
            orders += 1;
        }
        ops.push(WriteOp::set(db.leads().collection(), &lead.id, &lead)?);
    }

    println!();
    println!("Writing {} documents...", ops.len());
    let report = db.store().write_batch(&ops).await?;

    let elapsed = start.elapsed();
    println!();
    println!(
        "✓ Wrote {} documents in {} batches ({:?})",
        report.writes, report.chunks, elapsed
    );
    println!("  Leads:  {}", count);
    println!("  Orders: {}", orders);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn generate_inventory(
    name: &str,
    days: i64,
    tickets: i64,
    buying: f64,
    selling: f64,
    categorized: bool,
) -> Inventory {
    let categories = if categorized {
        vec![
            InventoryCategory {
                name: "Premium".to_string(),
                section: Some("North Stand".to_string()),
                total_tickets: tickets / 4,
                available_tickets: tickets / 4,
                buying_price: Some(buying * 1.8),
                selling_price: Some(selling * 1.8),
                ..Default::default()
            },
            InventoryCategory {
                name: "General".to_string(),
                section: Some("East Stand".to_string()),
                total_tickets: tickets - tickets / 4,
                available_tickets: tickets - tickets / 4,
                buying_price: Some(buying),
                selling_price: Some(selling),
                ..Default::default()
            },
        ]
    } else {
        Vec::new()
    };

    Inventory {
        id: new_id(),
        event_name: name.to_string(),
        event_date: Some(Utc::now() + Duration::days(days)),
        event_type: Some("sports".to_string()),
        available_tickets: tickets,
        total_tickets: tickets,
        buying_price: Some(buying),
        selling_price: Some(selling),
        categories,
        created_date: Some(Utc::now()),
        ..Default::default()
    }
}

/// Generates a single lead with realistic data.
fn generate_lead(seed: usize, seller: &User) -> Lead {
    let status = STATUSES[seed % STATUSES.len()];
    let temperature = match seed % 3 {
        0 => Temperature::Hot,
        1 => Temperature::Warm,
        _ => Temperature::Cold,
    };
    let business_type = if seed % 4 == 0 {
        BusinessType::B2b
    } else {
        BusinessType::B2c
    };
    let assigned = !matches!(status, LeadStatus::Unassigned);
    let enquiry = Utc::now() - Duration::days((seed % 150) as i64);

    Lead {
        id: new_id(),
        name: Some(format!("Client {:04}", seed)),
        email: Some(format!("client{:04}@example.com", seed)),
        phone: Some(format!("98{:08}", seed)),
        company: (business_type == BusinessType::B2b).then(|| format!("Company {:03}", seed)),
        business_type: Some(business_type),
        source: Some(SOURCES[seed % SOURCES.len()].to_string()),
        campaign_name: Some(CAMPAIGNS[seed % CAMPAIGNS.len()].to_string()),
        date_of_enquiry: Some(enquiry),
        lead_for_event: Some(EVENTS[seed % EVENTS.len()].0.to_string()),
        number_of_people: Some(1 + (seed % 6) as i64),
        potential_value: Some(50_000.0 + ((seed * 7_919) % 450_000) as f64),
        status,
        temperature: Some(temperature),
        assigned_to: assigned.then(|| seller.email.clone()),
        assigned_date: assigned.then_some(enquiry),
        created_date: Some(enquiry),
        ..Default::default()
    }
}

fn generate_order(seed: usize, lead: &Lead, seller: &User, item: &Inventory) -> (Order, Allocation) {
    let tickets = 1 + (seed % 4) as i64;
    let selling = item.selling_price.unwrap_or(0.0);
    let buying = item.buying_price.unwrap_or(0.0);
    let usd = seed % 5 == 0;
    let (currency, rate, base) = if usd {
        ("USD", 83.5, selling * tickets as f64 / 83.5)
    } else {
        ("INR", 1.0, selling * tickets as f64)
    };

    let order = Order {
        id: new_id(),
        order_number: Some(format!("ORD-SEED-{:05}", seed)),
        lead_id: Some(lead.id.clone()),
        client_name: lead.name.clone(),
        client_email: lead.email.clone(),
        client_phone: lead.phone.clone(),
        event_name: Some(item.event_name.clone()),
        event_date: item.event_date,
        status: OrderStatus::Approved,
        payment_currency: Some(currency.to_string()),
        exchange_rate: Some(rate),
        base_amount: Some(base),
        total_amount: Some(base),
        sales_person: Some(seller.email.clone()),
        created_date: lead.created_date,
        ..Default::default()
    };

    let allocation = Allocation {
        id: new_id(),
        lead_id: Some(lead.id.clone()),
        order_id: Some(order.id.clone()),
        order_number: order.order_number.clone(),
        inventory_id: Some(item.id.clone()),
        event_name: Some(item.event_name.clone()),
        tickets_allocated: tickets,
        selling_price: Some(selling),
        buying_price: Some(buying),
        total_buying_price: Some(buying * tickets as f64),
        allocation_date: lead.created_date,
        ..Default::default()
    };

    (order, allocation)
}
