use std::{convert::Infallible, sync::Arc};

use bytes::Bytes;
use sqlx::{Pool, Postgres};
use warp::{
    filters::{multipart::FormData, BoxedFilter},
    reply::Response,
    Filter, Reply,
};

use crate::{
    config::Config,
    error::Error,
    filters::QueryParams,
    jwt::SessionData,
    middleware::with_possible_session,
    schema::{Id, RecipeRelation},
};

use super::{handlers, rejection::handle_rejection};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
}

impl ApiContext {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

pub fn with_context(
    ctx: ApiContext,
) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn with_params() -> impl Filter<Extract = (QueryParams,), Error = warp::Rejection> + Copy {
    warp::query::<Vec<(String, String)>>().map(QueryParams::new)
}

fn with_body(limit: u64) -> impl Filter<Extract = (Bytes,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::bytes())
}

fn with_form(limit: u64) -> impl Filter<Extract = (FormData,), Error = warp::Rejection> + Clone {
    warp::multipart::form().max_length(limit)
}

/// Handler errors become responses here instead of rejections, so that a
/// failing handler never falls through to another route.
pub fn render(result: Result<Response, Error>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => {
            if e.code.is_server_error() {
                log::error!("Request failed: {e}");
            } else {
                log::debug!("Request rejected: {e}");
            }
            e.into_response()
        }
    }
}

fn user_routes(ctx: &ApiContext) -> BoxedFilter<(Response,)> {
    let session = with_possible_session(ctx.clone());
    let context = with_context(ctx.clone());
    let limit = ctx.config.max_body_bytes;

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(with_params())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::list_users)
        .map(render);

    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(session.clone())
        .and(with_body(limit))
        .and(context.clone())
        .then(handlers::register)
        .map(render);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::me)
        .map(render);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(session.clone())
        .and(with_body(limit))
        .and(context.clone())
        .then(handlers::set_password)
        .map(render);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(with_params())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::list_subscriptions)
        .map(render);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::user_detail)
        .map(render);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(with_params())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::subscribe)
        .map(render);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(session)
        .and(context)
        .then(handlers::unsubscribe)
        .map(render);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

fn auth_routes(ctx: &ApiContext) -> BoxedFilter<(Response,)> {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(with_body(ctx.config.max_body_bytes))
        .and(with_context(ctx.clone()))
        .then(handlers::login)
        .map(render);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .then(handlers::logout)
        .map(render);

    login.or(logout).unify().boxed()
}

fn catalog_routes(ctx: &ApiContext) -> BoxedFilter<(Response,)> {
    let session = with_possible_session(ctx.clone());
    let context = with_context(ctx.clone());

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::list_tags)
        .map(render);

    let tag = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::tag_detail)
        .map(render);

    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(with_params())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::list_ingredients)
        .map(render);

    let ingredient = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(session)
        .and(context)
        .then(handlers::ingredient_detail)
        .map(render);

    tags.or(tag)
        .unify()
        .or(ingredients)
        .unify()
        .or(ingredient)
        .unify()
        .boxed()
}

fn recipe_routes(ctx: &ApiContext) -> BoxedFilter<(Response,)> {
    let session = with_possible_session(ctx.clone());
    let context = with_context(ctx.clone());
    let limit = ctx.config.max_body_bytes;

    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(with_params())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::list_recipes)
        .map(render);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(session.clone())
        .and(with_body(limit))
        .and(context.clone())
        .then(handlers::create_recipe)
        .map(render);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::download_shopping_cart)
        .map(render);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::recipe_detail)
        .map(render);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch().or(warp::put()).unify())
        .and(warp::method())
        .and(session.clone())
        .and(with_body(limit))
        .and(context.clone())
        .then(handlers::update_recipe)
        .map(render);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(session.clone())
        .and(context.clone())
        .then(handlers::delete_recipe)
        .map(render);

    let image = warp::path!("api" / "recipes" / Id / "image")
        .and(warp::put())
        .and(session.clone())
        .and(with_form(limit))
        .and(context.clone())
        .then(handlers::upload_image)
        .map(render);

    let favorite = relation_routes(
        warp::path!("api" / "recipes" / Id / "favorite").boxed(),
        RecipeRelation::Favorite,
        ctx,
    );
    let shopping_cart = relation_routes(
        warp::path!("api" / "recipes" / Id / "shopping_cart").boxed(),
        RecipeRelation::ShoppingCart,
        ctx,
    );

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(image)
        .unify()
        .or(favorite)
        .unify()
        .or(shopping_cart)
        .unify()
        .boxed()
}

/// POST adds the recipe to the relation, DELETE removes it.
fn relation_routes(
    path: BoxedFilter<(Id,)>,
    relation: RecipeRelation,
    ctx: &ApiContext,
) -> BoxedFilter<(Response,)> {
    let add = path
        .clone()
        .and(warp::post())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .then(move |id: Id, session: Option<SessionData>, ctx: ApiContext| {
            handlers::add_relation(relation, id, session, ctx)
        })
        .map(render);

    let remove = path
        .and(warp::delete())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .then(move |id: Id, session: Option<SessionData>, ctx: ApiContext| {
            handlers::remove_relation(relation, id, session, ctx)
        })
        .map(render);

    add.or(remove).unify().boxed()
}

/// Every route of the service, with rejection recovery and access logging.
pub fn routes(
    ctx: ApiContext,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(ctx.config.media_root.clone()));

    user_routes(&ctx)
        .or(auth_routes(&ctx))
        .unify()
        .or(catalog_routes(&ctx))
        .unify()
        .or(recipe_routes(&ctx))
        .unify()
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}
