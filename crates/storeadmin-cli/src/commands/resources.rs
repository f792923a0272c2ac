//! Product, category and user commands.

use anyhow::Result;
use storeadmin_core::models::ProductFilter;

use super::Context;
use crate::output::{self, truncate};

pub async fn list_products(ctx: &Context, filter: &ProductFilter) -> Result<()> {
    let products = ctx.client.products(filter).await?;
    output::print_list(&products, ctx.format, |p| {
        format!(
            "{:>5}  {:<40}  {:>10}  {}",
            p.id,
            truncate(&p.title, 40),
            p.price_display(),
            p.category_name()
        )
    });
    Ok(())
}

pub async fn show_product(ctx: &Context, id: i64) -> Result<()> {
    let product = ctx.client.product(id).await?;
    output::print_record(
        &product,
        ctx.format,
        &[
            ("ID", product.id.to_string()),
            ("Title", product.title.clone()),
            ("Price", product.price_display()),
            ("Category", product.category_name().to_string()),
            ("Description", truncate(&product.description, 200)),
            ("Images", product.images.len().to_string()),
        ],
    );
    Ok(())
}

pub async fn delete_product(ctx: &Context, id: i64) -> Result<()> {
    report_delete(ctx, "Product", id, ctx.client.delete_product(id).await?)
}

pub async fn list_categories(ctx: &Context) -> Result<()> {
    let categories = ctx.client.categories().await?;
    output::print_list(&categories, ctx.format, |c| format!("{:>5}  {}", c.id, c.name));
    Ok(())
}

pub async fn show_category(ctx: &Context, id: i64) -> Result<()> {
    let category = ctx.client.category(id).await?;
    output::print_record(
        &category,
        ctx.format,
        &[
            ("ID", category.id.to_string()),
            ("Name", category.name.clone()),
            ("Image", category.image.clone().unwrap_or_else(|| "-".to_string())),
        ],
    );
    Ok(())
}

pub async fn delete_category(ctx: &Context, id: i64) -> Result<()> {
    report_delete(ctx, "Category", id, ctx.client.delete_category(id).await?)
}

pub async fn list_users(ctx: &Context) -> Result<()> {
    let users = ctx.client.users().await?;
    output::print_list(&users, ctx.format, |u| {
        format!(
            "{:>5}  {:<24}  {:<32}  {}",
            u.id,
            truncate(&u.name, 24),
            truncate(&u.email, 32),
            u.role_display()
        )
    });
    Ok(())
}

pub async fn show_user(ctx: &Context, id: i64) -> Result<()> {
    let user = ctx.client.user(id).await?;
    output::print_record(
        &user,
        ctx.format,
        &[
            ("ID", user.id.to_string()),
            ("Name", user.name.clone()),
            ("Email", user.email.clone()),
            ("Role", user.role_display().to_string()),
        ],
    );
    Ok(())
}

fn report_delete(ctx: &Context, kind: &str, id: i64, deleted: bool) -> Result<()> {
    if deleted {
        output::print_success(&format!("{} {} deleted", kind, id), ctx.format);
        Ok(())
    } else {
        anyhow::bail!("{} {} was not deleted", kind, id)
    }
}
