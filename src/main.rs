use clap::{Parser, Subcommand};
use flora_admin::config::AppConfig;
use flora_admin::logic::{retry, AssignmentService, ListView, MutationCoordinator, Notifier};
use flora_admin::model::{Id, Location, Relation, RelationAttributes, RelationKind, RelationUpdate};
use flora_admin::store::{HttpRelationStore, Store};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "flora-admin")]
#[command(about = "Manage Flora IM location relations from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tax rates or employees of a location
    List {
        #[arg(long, default_value = "tax")]
        kind: RelationKind,
        location: Id,
    },
    /// Assign a tax rate or employee to a location
    Assign {
        #[arg(long, default_value = "tax")]
        kind: RelationKind,
        location: Id,
        target: Id,
        #[arg(long)]
        default: bool,
        #[arg(long)]
        manager: bool,
    },
    /// Make a tax rate the default for a location
    SetDefault { location: Id, tax: Id },
    /// Change the flags of an existing relation
    Update {
        #[arg(long, default_value = "tax")]
        kind: RelationKind,
        location: Id,
        target: Id,
        #[arg(long)]
        default: Option<bool>,
        #[arg(long)]
        manager: Option<bool>,
    },
    /// Remove a tax rate or employee from a location
    Remove {
        #[arg(long, default_value = "tax")]
        kind: RelationKind,
        location: Id,
        target: Id,
    },
    /// List locations
    Locations,
    /// Delete a location
    DeleteLocation { id: Id },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();
    flora_admin::init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let store = Arc::new(HttpRelationStore::from_config(&config)?);
    log::debug!("Configuration loaded: remote={}", store.base_url());

    let notifier = Arc::new(Notifier::new(config.notification_durations()));
    let coordinator = MutationCoordinator::new(config.retry_policy(), Arc::clone(&notifier));

    let result = run(cli.command, store, coordinator).await;

    for notification in notifier.active() {
        println!("[{:?}] {}", notification.level, notification.message);
    }

    result
}

async fn run<S: Store>(command: Command, store: Arc<S>, coordinator: MutationCoordinator) -> anyhow::Result<()> {
    match command {
        Command::Locations => {
            let locations = retry::execute(coordinator.policy(), || store.list_locations()).await?;
            print_locations(&locations);
        }
        Command::DeleteLocation { id } => {
            let locations = retry::execute(coordinator.policy(), || store.list_locations()).await?;
            let view: ListView<Location> = ListView::new("location", coordinator);
            view.replace_rows(locations);
            view.delete(&id, || store.delete_location(&id)).await?;
            print_locations(&view.rows());
        }
        Command::List { kind, location } => {
            let service = AssignmentService::new(store, coordinator);
            let relations = service.load(kind, &location).await?;
            print_relations(kind, &relations);
        }
        Command::Assign {
            kind,
            location,
            target,
            default,
            manager,
        } => {
            let service = AssignmentService::new(store, coordinator);
            service.load(kind, &location).await?;
            let attributes = RelationAttributes {
                is_default: default,
                is_manager: manager,
            };
            service.assign(kind, &location, &target, attributes).await?;
            print_relations(kind, &service.relations(kind, &location));
        }
        Command::SetDefault { location, tax } => {
            let service = AssignmentService::new(store, coordinator);
            service.load(RelationKind::LocationTax, &location).await?;
            service.set_default(&location, &tax).await?;
            print_relations(
                RelationKind::LocationTax,
                &service.relations(RelationKind::LocationTax, &location),
            );
        }
        Command::Update {
            kind,
            location,
            target,
            default,
            manager,
        } => {
            let service = AssignmentService::new(store, coordinator);
            service.load(kind, &location).await?;
            let update = RelationUpdate {
                is_default: default,
                is_manager: manager,
            };
            service.update(kind, &location, &target, update).await?;
            print_relations(kind, &service.relations(kind, &location));
        }
        Command::Remove { kind, location, target } => {
            let service = AssignmentService::new(store, coordinator);
            service.load(kind, &location).await?;
            service.remove(kind, &location, &target).await?;
            print_relations(kind, &service.relations(kind, &location));
        }
    }

    Ok(())
}

fn print_relations(kind: RelationKind, relations: &[Relation]) {
    if relations.is_empty() {
        println!("No {} assigned", kind.noun());
        return;
    }
    for relation in relations {
        let mut flags = Vec::new();
        if relation.attributes.is_default {
            flags.push("default");
        }
        if relation.attributes.is_manager {
            flags.push("manager");
        }
        println!(
            "{}\t{}\t{}",
            relation.right_id,
            relation.label.as_deref().unwrap_or("-"),
            flags.join(",")
        );
    }
}

fn print_locations(locations: &[Location]) {
    for location in locations {
        let marker = if location.is_default { " (default)" } else { "" };
        println!("{}\t{}{}", location.id, location.name, marker);
    }
}
